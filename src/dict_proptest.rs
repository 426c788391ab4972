#![cfg(test)]

// Property tests for Dict kept inside the crate so they can check table internals
// (rehash index, per-table occupancy) alongside the public behavior.

use crate::dict::{Dict, Replace};
use crate::dict_type::{DefaultType, DictType};
use crate::entry::EntryId;
use crate::error::DictError;
use proptest::prelude::*;
use proptest::test_runner::TestCaseError;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::hash::{BuildHasher, Hasher};

// Pool-indexed operations so shrinking moves toward earlier keys and shorter runs.
#[derive(Clone, Debug)]
enum OpI {
    Add(usize, i32),
    Replace(usize, i32),
    Delete(usize),
    Unlink(usize),
    Find(usize),
    SetVal(usize, i32),
    RehashStep(u8),
    Iterate,
    SafeIterateDeleting,
    Scan,
    Random,
}

fn arb_scenario() -> impl Strategy<Value = (Vec<String>, Vec<OpI>)> {
    proptest::collection::btree_set("[a-z]{1,4}", 1..=48).prop_flat_map(|set| {
        let pool: Vec<String> = set.into_iter().collect();
        let idx = 0..pool.len();
        let op = prop_oneof![
            4 => (idx.clone(), any::<i32>()).prop_map(|(i, v)| OpI::Add(i, v)),
            2 => (idx.clone(), any::<i32>()).prop_map(|(i, v)| OpI::Replace(i, v)),
            2 => idx.clone().prop_map(OpI::Delete),
            1 => idx.clone().prop_map(OpI::Unlink),
            2 => idx.clone().prop_map(OpI::Find),
            1 => (idx.clone(), any::<i32>()).prop_map(|(i, v)| OpI::SetVal(i, v)),
            1 => (1u8..8).prop_map(OpI::RehashStep),
            1 => Just(OpI::Iterate),
            1 => Just(OpI::SafeIterateDeleting),
            1 => Just(OpI::Scan),
            1 => Just(OpI::Random),
        ];
        proptest::collection::vec(op, 1..120).prop_map(move |ops| (pool.clone(), ops))
    })
}

fn val_of<T>(sut: &Dict<T>, id: EntryId) -> Option<i32>
where
    T: DictType<Key = String, Val = i32>,
{
    sut.get(id).and_then(|e| e.val().copied())
}

// State-machine equivalence against a BTreeMap model. After every op:
// - len parity, and per-table occupancy sums to len;
// - while rehashing, main-table buckets below the rehash index are empty;
// - handles of deleted keys no longer resolve, handles of live keys stay put.
fn run_state_machine<T>(
    mut sut: Dict<T>,
    pool: &[String],
    ops: Vec<OpI>,
) -> Result<(), TestCaseError>
where
    T: DictType<Key = String, Val = i32>,
{
    let mut model: BTreeMap<String, i32> = BTreeMap::new();
    let mut live: HashMap<String, EntryId> = HashMap::new();
    let mut stale: Vec<EntryId> = Vec::new();

    for op in ops {
        match op {
            OpI::Add(i, v) => {
                let k = pool[i].clone();
                let already = model.contains_key(&k);
                match sut.add(k.clone(), v) {
                    Ok(id) => {
                        prop_assert!(!already, "add must fail on duplicate");
                        prop_assert!(live.insert(k.clone(), id).is_none());
                        model.insert(k, v);
                    }
                    Err(DictError::DuplicateKey) => prop_assert!(already),
                    Err(e) => prop_assert!(false, "unexpected error {e}"),
                }
            }
            OpI::Replace(i, v) => {
                let k = pool[i].clone();
                let already = model.contains_key(&k);
                let outcome = sut.replace(k.clone(), v);
                prop_assert_eq!(outcome == Replace::Updated, already);
                if !already {
                    let id = sut.peek(&k).expect("just inserted");
                    live.insert(k.clone(), id);
                }
                model.insert(k, v);
            }
            OpI::Delete(i) => {
                let k = &pool[i];
                let res = sut.delete(k);
                match model.remove(k) {
                    Some(_) => {
                        prop_assert!(res.is_ok());
                        stale.push(live.remove(k).expect("tracked"));
                    }
                    None => prop_assert_eq!(res, Err(DictError::KeyNotFound)),
                }
            }
            OpI::Unlink(i) => {
                let k = &pool[i];
                match (sut.unlink(k), model.remove(k)) {
                    (Some(e), Some(mv)) => {
                        prop_assert_eq!(e.key(), k);
                        prop_assert_eq!(e.value().as_val().copied(), Some(mv));
                        sut.free_unlinked_entry(e);
                        stale.push(live.remove(k).expect("tracked"));
                    }
                    (None, None) => {}
                    (s, m) => prop_assert!(false, "unlink mismatch: {:?} vs {:?}", s.is_some(), m),
                }
            }
            OpI::Find(i) => {
                let k = &pool[i];
                let found = sut.find(k);
                prop_assert_eq!(found.is_some(), model.contains_key(k));
                if let Some(id) = found {
                    prop_assert_eq!(Some(&id), live.get(k));
                    prop_assert_eq!(val_of(&sut, id), model.get(k).copied());
                }
            }
            OpI::SetVal(i, v) => {
                let k = &pool[i];
                if let Some(&id) = live.get(k) {
                    prop_assert!(sut.set_val(id, v).is_ok());
                    model.insert(k.clone(), v);
                }
            }
            OpI::RehashStep(n) => {
                let more = sut.rehash(n as usize);
                if !more {
                    prop_assert!(!sut.is_rehashing());
                }
            }
            OpI::Iterate => {
                let got: BTreeMap<String, i32> = sut
                    .iter()
                    .map(|(_, e)| (e.key().clone(), e.val().copied().unwrap_or_default()))
                    .collect();
                prop_assert_eq!(&got, &model);
            }
            OpI::SafeIterateDeleting => {
                // Delete every entry with an odd value as it is returned.
                let mut it = sut.safe_iterator();
                let mut seen = BTreeSet::new();
                while let Some(id) = sut.next_entry(&mut it) {
                    let (k, v) = {
                        let e = sut.get(id).expect("returned entry is live");
                        (e.key().clone(), e.val().copied().unwrap_or_default())
                    };
                    prop_assert!(seen.insert(k.clone()), "entry returned twice");
                    if v % 2 != 0 {
                        prop_assert!(sut.delete(&k).is_ok());
                        model.remove(&k);
                        stale.push(live.remove(&k).expect("tracked"));
                    }
                }
                sut.release_iterator(it);
            }
            OpI::Scan => {
                let mut seen: BTreeSet<String> = BTreeSet::new();
                let mut cursor = 0;
                loop {
                    cursor = sut.scan(cursor, |_, e| {
                        seen.insert(e.key().clone());
                    });
                    if cursor == 0 {
                        break;
                    }
                }
                let keys: BTreeSet<String> = model.keys().cloned().collect();
                prop_assert_eq!(seen, keys);
            }
            OpI::Random => {
                let pick = sut.random_key();
                prop_assert_eq!(pick.is_some(), !model.is_empty());
                if let Some(id) = pick {
                    let k = sut.get(id).expect("live").key().clone();
                    prop_assert!(model.contains_key(&k));
                }
            }
        }

        for &id in &stale {
            prop_assert!(sut.get(id).is_none());
        }
        prop_assert_eq!(sut.len(), model.len());
        let (u0, u1) = sut.table_used();
        prop_assert_eq!(u0 + u1, model.len());
        if let Some(ridx) = sut.rehash_index() {
            for b in 0..ridx {
                prop_assert!(sut.tables[0].head(b).is_none(), "migrated bucket {} not empty", b);
            }
        } else {
            prop_assert_eq!(sut.table_sizes().1, 0);
        }
        prop_assert!(!sut.is_rehash_paused());
    }
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]
    #[test]
    fn prop_state_machine((pool, ops) in arb_scenario()) {
        run_state_machine(Dict::new(), &pool, ops)?;
    }
}

// Collision variant using a constant hasher: every key shares one chain.
#[derive(Clone, Default)]
struct ConstBuildHasher;
struct ConstHasher;
impl BuildHasher for ConstBuildHasher {
    type Hasher = ConstHasher;
    fn build_hasher(&self) -> Self::Hasher {
        ConstHasher
    }
}
impl Hasher for ConstHasher {
    fn write(&mut self, _bytes: &[u8]) {}
    fn finish(&self) -> u64 {
        0
    }
}

proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]
    #[test]
    fn prop_state_machine_with_collisions((pool, ops) in arb_scenario()) {
        let ty: DefaultType<String, i32, ConstBuildHasher> =
            DefaultType::with_hasher(ConstBuildHasher);
        run_state_machine(Dict::with_type(ty), &pool, ops)?;
    }
}
