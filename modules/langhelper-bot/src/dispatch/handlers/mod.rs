//! One handler per command. Each returns an error instead of replying when
//! something goes wrong; the dispatch loop logs it.

mod insert;
mod lookup;
mod random;
mod start;

use std::sync::Arc;

use langhelper_store::WordStore;

use crate::delivery::Deliver;

pub use lookup::{parse_lookup, LookupRequest};
pub use random::GUIDANCE_REPLY;
pub use start::WELCOME_REPLY;

#[derive(Clone)]
pub struct Handlers {
    store: Arc<dyn WordStore>,
    delivery: Arc<dyn Deliver>,
}

impl Handlers {
    pub fn new(store: Arc<dyn WordStore>, delivery: Arc<dyn Deliver>) -> Self {
        Self { store, delivery }
    }
}

/// Uppercase the first letter of each word, lowercase the rest.
pub fn title_case(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut word_start = true;
    for c in text.chars() {
        if c.is_whitespace() {
            word_start = true;
            out.push(c);
        } else if word_start {
            word_start = false;
            out.extend(c.to_uppercase());
        } else {
            out.extend(c.to_lowercase());
        }
    }
    out
}
