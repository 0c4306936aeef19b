//! Delegation & Voting
//!
//! Accounts vote for a provider with weight equal to their liquidity
//! balance; the book tracks aggregate weight per provider and exposes the
//! top-2. A privileged change operation redirects the custodial
//! reward-forwarding target to the legitimate top set, guarded against
//! same-unit flash manipulation and same-period re-entry.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use pair_core::{Address, Amount, BlockHeight, EngineError, Period, Result};

/// A single account's standing vote
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderVote {
    pub provider: Address,
    /// Weight attributed at vote time, kept in sync with balance changes
    pub weight: Amount,
}

/// Aggregated vote book
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VoteBook {
    /// Standing vote per account
    votes: HashMap<Address, ProviderVote>,
    /// Providers in first-vote order; the tie-break for the top set
    providers: Vec<Address>,
    /// Aggregate weight per provider
    tallies: HashMap<Address, Amount>,
}

impl VoteBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `voter`'s choice at `weight`, superseding any prior vote
    pub fn vote(&mut self, voter: &Address, provider: &Address, weight: Amount) {
        self.retract(voter);
        if !self.tallies.contains_key(provider) {
            self.providers.push(provider.clone());
        }
        *self.tallies.entry(provider.clone()).or_insert(0) += weight;
        self.votes.insert(
            voter.clone(),
            ProviderVote {
                provider: provider.clone(),
                weight,
            },
        );
    }

    /// Re-sync `voter`'s standing weight after a balance change. A vote
    /// whose weight burned away to zero is removed implicitly.
    pub fn sync_weight(&mut self, voter: &Address, new_weight: Amount) {
        let Some(vote) = self.votes.get(voter).cloned() else {
            return;
        };
        if new_weight == 0 {
            self.retract(voter);
            return;
        }
        if let Some(tally) = self.tallies.get_mut(&vote.provider) {
            *tally = tally.saturating_sub(vote.weight).saturating_add(new_weight);
        }
        self.votes.insert(
            voter.clone(),
            ProviderVote {
                provider: vote.provider,
                weight: new_weight,
            },
        );
    }

    fn retract(&mut self, voter: &Address) {
        if let Some(prev) = self.votes.remove(voter) {
            if let Some(tally) = self.tallies.get_mut(&prev.provider) {
                *tally = tally.saturating_sub(prev.weight);
            }
        }
    }

    pub fn vote_of(&self, voter: &Address) -> Option<&ProviderVote> {
        self.votes.get(voter)
    }

    pub fn tally(&self, provider: &Address) -> Amount {
        self.tallies.get(provider).copied().unwrap_or(0)
    }

    /// Top-2 distinct providers by aggregate weight. Ties break by
    /// first-vote order: the earlier-voted-for provider wins, nothing else.
    pub fn most_voted(&self) -> (Option<Address>, Option<Address>) {
        let mut first: Option<(&Address, Amount)> = None;
        let mut second: Option<(&Address, Amount)> = None;
        for provider in &self.providers {
            let weight = self.tally(provider);
            if weight == 0 {
                continue;
            }
            // Strict comparisons keep earlier entries ahead on equal weight
            if first.map_or(true, |(_, w)| weight > w) {
                second = first;
                first = Some((provider, weight));
            } else if second.map_or(true, |(_, w)| weight > w) {
                second = Some((provider, weight));
            }
        }
        (
            first.map(|(p, _)| p.clone()),
            second.map(|(p, _)| p.clone()),
        )
    }
}

/// The 1-2 providers currently receiving forwarded delegation weight
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelegationTarget {
    pub providers: (Option<Address>, Option<Address>),
    /// Block of the last change
    pub changed_at_block: BlockHeight,
    /// Period of the last change; a second change in the same period is
    /// rejected
    pub changed_in_period: Option<Period>,
}

impl DelegationTarget {
    /// Validate and install `new_pair` as the delegation target.
    ///
    /// Accepts only a duplicate-free, non-empty pair whose entries are
    /// drawn from the current top-2 tally, differing from the installed
    /// target, at most once per period.
    pub fn change(
        &mut self,
        book: &VoteBook,
        new_pair: (Option<Address>, Option<Address>),
        block: BlockHeight,
        period: Period,
    ) -> Result<()> {
        if self.changed_in_period == Some(period) {
            return Err(EngineError::InvalidProviders {
                reason: format!("providers already changed in period {}", period),
            });
        }
        let entries: Vec<&Address> = [&new_pair.0, &new_pair.1]
            .into_iter()
            .flatten()
            .collect();
        if entries.is_empty() {
            return Err(EngineError::InvalidProviders {
                reason: "empty provider set".into(),
            });
        }
        if entries.len() == 2 && entries[0] == entries[1] {
            return Err(EngineError::InvalidProviders {
                reason: format!("duplicate provider {}", entries[0]),
            });
        }
        // Every entry must be a member of the current legitimate top set;
        // stale or manipulated inputs are rejected.
        let (top1, top2) = book.most_voted();
        let legitimate = [top1, top2];
        for entry in &entries {
            if !legitimate.iter().flatten().any(|t| t == *entry) {
                return Err(EngineError::InvalidProviders {
                    reason: format!("{} is not among the most voted providers", entry),
                });
            }
        }
        if new_pair == self.providers {
            return Err(EngineError::InvalidProviders {
                reason: "provider set is already installed".into(),
            });
        }
        self.providers = new_pair;
        self.changed_at_block = block;
        self.changed_in_period = Some(period);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(s: &str) -> Address {
        Address::new(s)
    }

    #[test]
    fn test_vote_supersedes_prior_vote() {
        let mut book = VoteBook::new();
        book.vote(&addr("v1"), &addr("p1"), 100);
        book.vote(&addr("v1"), &addr("p2"), 100);

        assert_eq!(book.tally(&addr("p1")), 0);
        assert_eq!(book.tally(&addr("p2")), 100);
        assert_eq!(book.vote_of(&addr("v1")).unwrap().provider, addr("p2"));
    }

    #[test]
    fn test_most_voted_top_two() {
        let mut book = VoteBook::new();
        book.vote(&addr("v1"), &addr("p1"), 50);
        book.vote(&addr("v2"), &addr("p2"), 80);
        book.vote(&addr("v3"), &addr("p3"), 20);

        assert_eq!(book.most_voted(), (Some(addr("p2")), Some(addr("p1"))));
    }

    #[test]
    fn test_most_voted_tie_breaks_by_insertion_order() {
        let mut book = VoteBook::new();
        book.vote(&addr("v1"), &addr("p1"), 50);
        book.vote(&addr("v2"), &addr("p2"), 50);
        // Equal weight: the earlier-voted-for provider wins
        assert_eq!(book.most_voted(), (Some(addr("p1")), Some(addr("p2"))));

        // Same tally reached in the other order flips the result
        let mut book = VoteBook::new();
        book.vote(&addr("v2"), &addr("p2"), 50);
        book.vote(&addr("v1"), &addr("p1"), 50);
        assert_eq!(book.most_voted(), (Some(addr("p2")), Some(addr("p1"))));
    }

    #[test]
    fn test_sync_weight_tracks_balance() {
        let mut book = VoteBook::new();
        book.vote(&addr("v1"), &addr("p1"), 100);
        book.sync_weight(&addr("v1"), 40);
        assert_eq!(book.tally(&addr("p1")), 40);

        // Weight burned to zero removes the vote implicitly
        book.sync_weight(&addr("v1"), 0);
        assert_eq!(book.tally(&addr("p1")), 0);
        assert!(book.vote_of(&addr("v1")).is_none());
        assert_eq!(book.most_voted(), (None, None));
    }

    #[test]
    fn test_sync_weight_without_vote_is_noop() {
        let mut book = VoteBook::new();
        book.sync_weight(&addr("v1"), 40);
        assert!(book.vote_of(&addr("v1")).is_none());
    }

    #[test]
    fn test_change_accepts_current_top_set() {
        let mut book = VoteBook::new();
        book.vote(&addr("v1"), &addr("p1"), 80);
        book.vote(&addr("v2"), &addr("p2"), 50);

        let mut target = DelegationTarget::default();
        target
            .change(&book, (Some(addr("p1")), Some(addr("p2"))), 10, 1)
            .unwrap();
        assert_eq!(target.providers, (Some(addr("p1")), Some(addr("p2"))));
        assert_eq!(target.changed_at_block, 10);
    }

    #[test]
    fn test_change_accepts_legitimate_subset() {
        let mut book = VoteBook::new();
        book.vote(&addr("v1"), &addr("p1"), 80);
        book.vote(&addr("v2"), &addr("p2"), 50);

        let mut target = DelegationTarget::default();
        target.change(&book, (Some(addr("p2")), None), 10, 1).unwrap();
    }

    #[test]
    fn test_change_rejects_stale_or_manipulated_input() {
        let mut book = VoteBook::new();
        book.vote(&addr("v1"), &addr("p1"), 80);

        let mut target = DelegationTarget::default();
        let err = target
            .change(&book, (Some(addr("p9")), None), 10, 1)
            .unwrap_err();
        assert_eq!(err.error_code(), "invalid_providers");
    }

    #[test]
    fn test_change_rejects_duplicates_and_empty() {
        let mut book = VoteBook::new();
        book.vote(&addr("v1"), &addr("p1"), 80);

        let mut target = DelegationTarget::default();
        assert!(target
            .change(&book, (Some(addr("p1")), Some(addr("p1"))), 10, 1)
            .is_err());
        assert!(target.change(&book, (None, None), 10, 1).is_err());
    }

    #[test]
    fn test_change_rejects_noop_and_same_period_reentry() {
        let mut book = VoteBook::new();
        book.vote(&addr("v1"), &addr("p1"), 80);
        book.vote(&addr("v2"), &addr("p2"), 50);

        let mut target = DelegationTarget::default();
        target.change(&book, (Some(addr("p1")), None), 10, 1).unwrap();

        // Same period: re-entry guard
        let err = target
            .change(&book, (Some(addr("p1")), Some(addr("p2"))), 11, 1)
            .unwrap_err();
        assert_eq!(err.error_code(), "invalid_providers");

        // Next period, but identical set: no-op rejected
        let err = target
            .change(&book, (Some(addr("p1")), None), 12, 2)
            .unwrap_err();
        assert_eq!(err.error_code(), "invalid_providers");

        // Next period with a different set succeeds
        target
            .change(&book, (Some(addr("p1")), Some(addr("p2"))), 12, 2)
            .unwrap();
    }
}
