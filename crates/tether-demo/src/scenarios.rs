//! The narrated scenarios.
//!
//! Every scenario returns `tether::Result` so allocation failures travel back
//! to `main` through `?` instead of aborting mid-narration.

use crate::Scenario;
use std::sync::Mutex;
use std::thread;
use tether::stats::block_stats;
use tether::{Result, SharedHandle, UniqueHandle, WeakHandle};
use tether_log::{debug, info, warn};

/// A resource that announces its own construction and destruction.
#[derive(Debug)]
pub struct Narrated {
    name: String,
}

impl Narrated {
    pub fn new(name: &str) -> Self {
        info!("{name} created");
        Narrated {
            name: name.to_string(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Drop for Narrated {
    fn drop(&mut self) {
        info!("{} deleted", self.name);
    }
}

/// Runs one scenario, or all of them in order.
pub fn run(scenario: Scenario) -> Result<()> {
    match scenario {
        Scenario::Shared => shared(),
        Scenario::Weak => weak(),
        Scenario::Cycle => cycle(),
        Scenario::Leak => leak(),
        Scenario::Deleter => deleter(),
        Scenario::Unique => unique(),
        Scenario::Take => take(),
        Scenario::Threads => threads(),
        Scenario::All => {
            for each in [
                Scenario::Shared,
                Scenario::Weak,
                Scenario::Cycle,
                Scenario::Leak,
                Scenario::Deleter,
                Scenario::Unique,
                Scenario::Take,
                Scenario::Threads,
            ] {
                info!("=== {:?} ===", each);
                run(each)?;
            }
            Ok(())
        }
    }
}

fn shared() -> Result<()> {
    let first = SharedHandle::try_new(Narrated::new("test1"))?;
    info!("count = {}", first.use_count());

    {
        let second = first.clone();
        info!("count = {}", first.use_count());
        info!("second sees {}", second.try_get()?.name());
    }
    info!("count = {}", first.use_count());

    let mut bob = SharedHandle::try_new(Narrated::new("Bob"))?;
    let mut chris = SharedHandle::try_new(Narrated::new("Chris"))?;
    bob.reset();
    info!("bob is empty: {}", bob.get().is_none());

    chris.try_reset_with(Narrated::new("anonymous"))?;
    info!("chris now holds {}", chris.try_get()?.name());
    Ok(())
}

fn weak() -> Result<()> {
    let mut owner = SharedHandle::try_new(Narrated::new("P1"))?;
    info!("count = {}", owner.use_count());

    let observer = WeakHandle::new(&owner);
    info!("count = {} (weak = {})", owner.use_count(), owner.weak_count());

    let locked = observer.lock();
    if let Some(object) = locked.get() {
        info!("locked {}, count = {}", object.name(), owner.use_count());
    }
    drop(locked);

    owner.reset();
    if observer.expired() {
        info!("the weak handle is expired");
    }
    debug!("lock after expiry is empty: {}", observer.lock().is_empty());
    Ok(())
}

struct Team {
    name: &'static str,
    qa: Mutex<WeakHandle<Member>>,
}

struct Member {
    team: SharedHandle<Team>,
}

impl Drop for Team {
    fn drop(&mut self) {
        info!("team {} destroyed", self.name);
    }
}

impl Drop for Member {
    fn drop(&mut self) {
        info!("member destroyed (team count before release = {})", self.team.use_count());
    }
}

fn cycle() -> Result<()> {
    let before = block_stats();

    let team = SharedHandle::try_new(Team {
        name: "matter",
        qa: Mutex::new(WeakHandle::empty()),
    })?;
    let member = SharedHandle::try_new(Member { team: team.clone() })?;
    if let Some(t) = team.get() {
        if let Ok(mut qa) = t.qa.lock() {
            *qa = member.downgrade();
        }
    }
    info!(
        "team count = {}, member count = {}, member weak = {}",
        team.use_count(),
        member.use_count(),
        member.weak_count()
    );

    drop(team);
    drop(member);

    let delta = block_stats().since(&before);
    info!("blocks allocated = {}, freed = {}", delta.allocated, delta.freed);
    Ok(())
}

struct StrongTeam {
    qa: Mutex<SharedHandle<StrongMember>>,
}

struct StrongMember {
    _team: SharedHandle<StrongTeam>,
}

fn leak() -> Result<()> {
    let before = block_stats();

    let team = SharedHandle::try_new(StrongTeam {
        qa: Mutex::new(SharedHandle::empty()),
    })?;
    let member = SharedHandle::try_new(StrongMember {
        _team: team.clone(),
    })?;
    if let Some(t) = team.get() {
        if let Ok(mut qa) = t.qa.lock() {
            *qa = member.clone();
        }
    }
    let observer = team.downgrade();

    drop(team);
    drop(member);

    let delta = block_stats().since(&before);
    if delta.live() > 0 {
        warn!(
            "{} control blocks still alive, team count = {}",
            delta.live(),
            observer.use_count()
        );
    }

    // Break the cycle so the demo itself does not leak.
    let team = observer.lock();
    if let Some(t) = team.get() {
        if let Ok(mut qa) = t.qa.lock() {
            qa.reset();
        }
    }
    drop(team);
    info!("after breaking the cycle, expired = {}", observer.expired());
    Ok(())
}

fn deleter() -> Result<()> {
    let plain = SharedHandle::try_new(Narrated::new("P1"))?;
    let custom = SharedHandle::try_with_deleter(Narrated::new("P2"), |object| {
        info!("custom deleter for {}", object.name());
        drop(object);
    })?;
    info!(
        "{} uses drop, {} uses a custom deleter",
        plain.try_get()?.name(),
        custom.try_get()?.name()
    );

    let batch: Vec<Narrated> = (0..3).map(|i| Narrated::new(&format!("batch[{i}]"))).collect();
    let _batch = UniqueHandle::with_deleter(batch, |items: Vec<Narrated>| {
        info!("closing batch of {}", items.len());
    });
    Ok(())
}

fn unique() -> Result<()> {
    let handle = UniqueHandle::new(Narrated::new("abc"));
    if let Some(object) = handle.get() {
        info!("owning {}", object.name());
    }

    let mut one = UniqueHandle::new(Narrated::new("Nordic"));
    let mut two = UniqueHandle::new(Narrated::new("Silabs"));
    info!("two holds {:?}", two.get().map(Narrated::name));
    two = one.take();
    info!("one is empty: {}, two holds {:?}", one.is_empty(), two.get().map(Narrated::name));

    consume(UniqueHandle::new(Narrated::new("some name")));
    let produced = produce();
    info!("produced {:?}", produced.get().map(Narrated::name));

    let shared = produced.into_shared();
    info!("converted to shared, count = {}", shared.use_count());
    Ok(())
}

fn consume(handle: UniqueHandle<Narrated>) {
    if let Some(object) = handle.get() {
        info!("consuming {}", object.name());
    }
}

fn produce() -> UniqueHandle<Narrated> {
    UniqueHandle::new(Narrated::new("object"))
}

fn take() -> Result<()> {
    let mut source = SharedHandle::try_new(Narrated::new("moved"))?;
    let observer = source.downgrade();

    let destination = source.take();
    info!(
        "source empty = {}, destination count = {}, observed count = {}",
        source.is_empty(),
        destination.use_count(),
        observer.use_count()
    );

    let copy = destination.clone();
    info!("a copy changes the count: {}", copy.use_count());
    Ok(())
}

fn threads() -> Result<()> {
    const WORKERS: usize = 4;

    let shared = SharedHandle::try_new(Narrated::new("worker input"))?;
    let observer = shared.downgrade();

    let handles: Vec<_> = (0..WORKERS)
        .map(|id| {
            let local = shared.clone();
            thread::spawn(move || {
                let name = local.get().map(|o| o.name().to_string()).unwrap_or_default();
                debug!("worker {id} sees {name}, count = {}", local.use_count());
            })
        })
        .collect();
    drop(shared);

    for handle in handles {
        if handle.join().is_err() {
            warn!("a worker panicked");
        }
    }
    info!("all workers finished, expired = {}", observer.expired());
    Ok(())
}
