// Shared fixtures for the integration suites.
#![allow(dead_code)]

use incdict::{DictType, Value};
use std::cell::RefCell;
use std::rc::Rc;

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Keys hash to themselves, so bucket placement is predictable.
#[derive(Default)]
pub struct Ident;

impl DictType for Ident {
    type Key = u64;
    type Val = u64;

    fn hash(&self, key: &u64) -> u64 {
        *key
    }

    fn key_eq(&self, a: &u64, b: &u64) -> bool {
        a == b
    }
}

/// String keys and values that record every destructor call.
#[derive(Default, Clone)]
pub struct Recording {
    pub freed_keys: Rc<RefCell<Vec<String>>>,
    pub freed_vals: Rc<RefCell<Vec<String>>>,
}

impl DictType for Recording {
    type Key = String;
    type Val = String;

    fn hash(&self, key: &String) -> u64 {
        incdict::gen_hash(key.as_bytes())
    }

    fn key_eq(&self, a: &String, b: &String) -> bool {
        a == b
    }

    fn destroy_key(&self, key: String) {
        self.freed_keys.borrow_mut().push(key);
    }

    fn destroy_val(&self, val: Value<String>) {
        if let Value::Val(v) = val {
            self.freed_vals.borrow_mut().push(v);
        }
    }
}
