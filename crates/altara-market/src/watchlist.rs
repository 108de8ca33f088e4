//! Session-scoped watchlist

use crate::ticker::Ticker;
use serde::{Deserialize, Serialize};

/// Insertion-ordered set of tickers owned by one session
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Watchlist {
    tickers: Vec<Ticker>,
}

impl Watchlist {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a ticker; returns `false` if it was already present
    pub fn add(&mut self, ticker: Ticker) -> bool {
        if self.contains(&ticker) {
            return false;
        }
        self.tickers.push(ticker);
        true
    }

    /// Remove a ticker; returns `false` if it was not present
    pub fn remove(&mut self, ticker: &Ticker) -> bool {
        if let Some(pos) = self.tickers.iter().position(|t| t == ticker) {
            self.tickers.remove(pos);
            true
        } else {
            false
        }
    }

    pub fn contains(&self, ticker: &Ticker) -> bool {
        self.tickers.contains(ticker)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Ticker> {
        self.tickers.iter()
    }

    pub fn len(&self) -> usize {
        self.tickers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tickers.is_empty()
    }
}

impl<'a> IntoIterator for &'a Watchlist {
    type Item = &'a Ticker;
    type IntoIter = std::slice::Iter<'a, Ticker>;

    fn into_iter(self) -> Self::IntoIter {
        self.tickers.iter()
    }
}
