//! Chain-length statistics for diagnostics.

use crate::dict::Dict;
use crate::dict_type::DictType;
use core::fmt;

/// Histogram length; longer chains are counted in the last slot.
pub const CHAIN_HISTOGRAM_LEN: usize = 50;

#[derive(Clone, Debug, PartialEq)]
pub struct TableStats {
    /// 0 for the main table, 1 for the rehash target.
    pub table: usize,
    pub size: usize,
    pub used: usize,
    /// Buckets with at least one entry.
    pub non_empty: usize,
    pub max_chain: usize,
    /// `histogram[n]` counts buckets whose chain has length `n`.
    pub histogram: [usize; CHAIN_HISTOGRAM_LEN],
    total_chain: usize,
}

impl TableStats {
    /// Mean length over non-empty buckets, from walking them.
    pub fn avg_chain_counted(&self) -> f64 {
        if self.non_empty == 0 {
            0.0
        } else {
            self.total_chain as f64 / self.non_empty as f64
        }
    }

    /// Mean length over non-empty buckets, from occupancy alone.
    pub fn avg_chain_computed(&self) -> f64 {
        if self.non_empty == 0 {
            0.0
        } else {
            self.used as f64 / self.non_empty as f64
        }
    }
}

impl fmt::Display for TableStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = if self.table == 0 {
            "main hash table"
        } else {
            "rehashing target"
        };
        if self.used == 0 {
            return writeln!(
                f,
                "Hash table {} stats ({name}):\nNo stats available for empty dictionaries",
                self.table
            );
        }
        writeln!(f, "Hash table {} stats ({name}):", self.table)?;
        writeln!(f, " table size: {}", self.size)?;
        writeln!(f, " number of elements: {}", self.used)?;
        writeln!(f, " different slots: {}", self.non_empty)?;
        writeln!(f, " max chain length: {}", self.max_chain)?;
        writeln!(f, " avg chain length (counted): {:.2}", self.avg_chain_counted())?;
        writeln!(f, " avg chain length (computed): {:.2}", self.avg_chain_computed())?;
        writeln!(f, " Chain length distribution:")?;
        for (len, &n) in self.histogram.iter().enumerate() {
            if n == 0 {
                continue;
            }
            let pct = n as f64 * 100.0 / self.size as f64;
            writeln!(f, "   {len}: {n} ({pct:.2}%)")?;
        }
        Ok(())
    }
}

/// Stats for the main table and, while rehashing, the target table.
#[derive(Clone, Debug, PartialEq)]
pub struct DictStats {
    pub main: TableStats,
    pub target: Option<TableStats>,
}

impl fmt::Display for DictStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.main)?;
        if let Some(t) = &self.target {
            write!(f, "{t}")?;
        }
        Ok(())
    }
}

impl<T: DictType> Dict<T> {
    pub fn stats(&self) -> DictStats {
        DictStats {
            main: self.table_stats(0),
            target: self.is_rehashing().then(|| self.table_stats(1)),
        }
    }

    fn table_stats(&self, table: usize) -> TableStats {
        let t = &self.tables[table];
        let mut s = TableStats {
            table,
            size: t.size(),
            used: t.used,
            non_empty: 0,
            max_chain: 0,
            histogram: [0; CHAIN_HISTOGRAM_LEN],
            total_chain: 0,
        };
        if t.used == 0 {
            return s;
        }
        for idx in 0..t.size() {
            let len = t.chain_len(&self.arena, idx);
            s.histogram[len.min(CHAIN_HISTOGRAM_LEN - 1)] += 1;
            if len == 0 {
                continue;
            }
            s.non_empty += 1;
            s.max_chain = s.max_chain.max(len);
            s.total_chain += len;
        }
        s
    }
}
