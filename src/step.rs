use crate::descriptor::EntityDescriptor;
use crate::error::Result;
use crate::{EntitiesDb, Group};
use std::marker::PhantomData;
use tracing::{debug, trace};

/// A processing routine executed once per step.
pub trait StepEngine: Send {
    /// Name used in logs.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    fn step(&mut self, db: &mut EntitiesDb) -> Result<()>;
}

/// Calls each registered engine once per step, in registration order.
#[derive(Default)]
pub struct StepDriver<'a> {
    engines: Vec<Box<dyn StepEngine + 'a>>,
    ticks: u64,
}

impl<'a> StepDriver<'a> {
    pub fn new() -> Self {
        Self {
            engines: Vec::new(),
            ticks: 0,
        }
    }

    /// Appends an engine to the step order.
    pub fn with(mut self, engine: impl StepEngine + 'a) -> Self {
        self.add(engine);
        self
    }

    pub fn add(&mut self, engine: impl StepEngine + 'a) {
        self.engines.push(Box::new(engine));
    }

    /// Runs every engine once.
    ///
    /// The first failing engine ends the step; engines after it do not run and the
    /// step is not counted.
    pub fn run_step(&mut self, db: &mut EntitiesDb) -> Result<()> {
        let tick = self.ticks + 1;
        for engine in &mut self.engines {
            trace!(tick, engine = engine.name(), "running engine");
            if let Err(err) = engine.step(db) {
                debug!(tick, engine = engine.name(), error = %err, "engine failed");
                return Err(err);
            }
        }
        self.ticks = tick;
        Ok(())
    }

    /// Returns the number of completed steps.
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn len(&self) -> usize {
        self.engines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.engines.is_empty()
    }
}

/// Spawns a fixed number of entities into a group, at most `per_step` per step.
///
/// Progress is kept in the spawner itself, so the work resumes on the next step.
/// The group's space for all entities is reserved on the first step.
pub struct StagedSpawner<D, F> {
    group: Group,
    target: usize,
    per_step: usize,
    spawned: usize,
    make: F,
    _descriptor: PhantomData<fn() -> D>,
}

impl<D, F> StagedSpawner<D, F>
where
    D: EntityDescriptor,
    F: FnMut(usize) -> D,
{
    /// `make` receives the sequence number of the entity being spawned.
    pub fn new(group: Group, target: usize, per_step: usize, make: F) -> Self {
        Self {
            group,
            target,
            per_step: per_step.max(1),
            spawned: 0,
            make,
            _descriptor: PhantomData,
        }
    }

    pub fn spawned(&self) -> usize {
        self.spawned
    }

    pub fn is_done(&self) -> bool {
        self.spawned >= self.target
    }
}

impl<D, F> StepEngine for StagedSpawner<D, F>
where
    D: EntityDescriptor,
    F: FnMut(usize) -> D + Send,
{
    fn step(&mut self, db: &mut EntitiesDb) -> Result<()> {
        if self.is_done() {
            return Ok(());
        }
        if self.spawned == 0 {
            db.preallocate_entity_space::<D>(self.group, self.target)?;
        }

        let end = self.target.min(self.spawned + self.per_step);
        while self.spawned < end {
            db.build_entity(self.group, (self.make)(self.spawned))?;
            self.spawned += 1;
        }
        Ok(())
    }
}
