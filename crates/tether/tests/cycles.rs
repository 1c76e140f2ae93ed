// Reference cycle tests
//
// Handles do not detect cycles. These tests pin down both sides of that
// contract: a strong/strong pair leaks, and a pair with one weak back-edge is
// freed when the last external strong handle goes away.

#![cfg(feature = "block-stats")]

mod common;

use common::Counter;
use std::cell::RefCell;
use tether::stats::{block_stats, reset_block_stats};
use tether::{SharedHandle, WeakHandle};

/// Holds a weak back-reference to its member.
struct Team {
    lead: RefCell<WeakHandle<Member>>,
    destroyed: Counter,
}

/// Holds a strong reference to its team.
struct Member {
    team: RefCell<SharedHandle<Team>>,
    destroyed: Counter,
}

impl Drop for Team {
    fn drop(&mut self) {
        self.destroyed.bump();
    }
}

impl Drop for Member {
    fn drop(&mut self) {
        self.destroyed.bump();
    }
}

/// Both directions strong: neither count can reach zero.
struct StrongTeam {
    lead: RefCell<SharedHandle<StrongMember>>,
    destroyed: Counter,
}

struct StrongMember {
    team: RefCell<SharedHandle<StrongTeam>>,
    destroyed: Counter,
}

impl Drop for StrongTeam {
    fn drop(&mut self) {
        self.destroyed.bump();
    }
}

impl Drop for StrongMember {
    fn drop(&mut self) {
        self.destroyed.bump();
    }
}

#[test]
fn test_weak_back_edge_frees_both() {
    reset_block_stats();
    let destroyed = Counter::new();

    let team = SharedHandle::new(Team {
        lead: RefCell::new(WeakHandle::empty()),
        destroyed: destroyed.clone(),
    });
    let member = SharedHandle::new(Member {
        team: RefCell::new(SharedHandle::empty()),
        destroyed: destroyed.clone(),
    });

    if let (Some(t), Some(m)) = (team.get(), member.get()) {
        *t.lead.borrow_mut() = member.downgrade();
        *m.team.borrow_mut() = team.clone();
    }

    assert_eq!(team.use_count(), 2);
    assert_eq!(member.use_count(), 1);
    assert_eq!(member.weak_count(), 1);

    let team_observer = team.downgrade();
    let member_observer = member.downgrade();

    // The member holds the team, so dropping the external team handle frees
    // nothing yet.
    drop(team);
    assert_eq!(destroyed.get(), 0);
    assert!(!team_observer.expired());

    // Dropping the last external member handle releases the member, which
    // in turn drops the last strong handle to the team.
    drop(member);
    assert_eq!(destroyed.get(), 2);
    assert!(member_observer.expired());
    assert!(team_observer.expired());
    assert!(member_observer.lock().is_empty());

    drop(team_observer);
    drop(member_observer);
    let stats = block_stats();
    assert_eq!(stats.allocated, 2);
    assert_eq!(stats.freed, 2);
    assert_eq!(stats.deleters_run, 2);
}

#[test]
fn test_team_weak_observer_reports_member_expiry() {
    let destroyed = Counter::new();

    let team = SharedHandle::new(Team {
        lead: RefCell::new(WeakHandle::empty()),
        destroyed: destroyed.clone(),
    });
    let member = SharedHandle::new(Member {
        team: RefCell::new(team.clone()),
        destroyed: destroyed.clone(),
    });
    if let Some(t) = team.get() {
        *t.lead.borrow_mut() = member.downgrade();
    }

    let lead_is_alive = |team: &SharedHandle<Team>| {
        team.get()
            .map(|t| !t.lead.borrow().expired())
            .unwrap_or(false)
    };

    assert!(lead_is_alive(&team));

    // Break the member's edge first so the team outlives the member.
    if let Some(m) = member.get() {
        m.team.borrow_mut().reset();
    }
    drop(member);

    assert_eq!(destroyed.get(), 1);
    assert!(!lead_is_alive(&team));
    assert_eq!(team.use_count(), 1);

    drop(team);
    assert_eq!(destroyed.get(), 2);
}

#[test]
fn test_strong_strong_pair_leaks() {
    reset_block_stats();
    let destroyed = Counter::new();

    let team = SharedHandle::new(StrongTeam {
        lead: RefCell::new(SharedHandle::empty()),
        destroyed: destroyed.clone(),
    });
    let member = SharedHandle::new(StrongMember {
        team: RefCell::new(team.clone()),
        destroyed: destroyed.clone(),
    });
    if let Some(t) = team.get() {
        *t.lead.borrow_mut() = member.clone();
    }

    let team_observer = team.downgrade();
    drop(team);
    drop(member);

    assert_eq!(destroyed.get(), 0);
    assert!(!team_observer.expired());
    assert_eq!(team_observer.use_count(), 1);
    assert_eq!(block_stats().live(), 2);

    // Breaking the cycle by hand releases both.
    if let Some(t) = team_observer.lock().get() {
        t.lead.borrow_mut().reset();
    }
    assert_eq!(destroyed.get(), 2);
    assert!(team_observer.expired());
}
