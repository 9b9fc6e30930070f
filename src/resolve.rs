//! Dependency ordering for a candidate set of migrations.
//!
//! Depth-first topological sort. Nodes are emitted post-order, so a migration
//! always follows everything it depends on. Independent migrations keep their
//! declaration order.

use std::collections::{HashMap, HashSet};

use crate::record::MigrationRecord;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolverError {
    #[error("circular dependency: {}", .0.join(" -> "))]
    Cycle(Vec<String>),

    #[error("duplicate migration id '{0}'")]
    DuplicateId(String),

    #[error("migration '{migration}' depends on '{dependency}', which is neither pending nor applied")]
    MissingDependency { migration: String, dependency: String },
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    Visiting,
    Done,
}

struct Resolver<'a, F> {
    candidates: &'a [MigrationRecord],
    index: HashMap<&'a str, usize>,
    marks: Vec<Mark>,
    path: Vec<usize>,
    order: Vec<usize>,
    satisfied: F,
}

impl<'a, F> Resolver<'a, F>
where
    F: Fn(&str) -> bool,
{
    fn new(candidates: &'a [MigrationRecord], satisfied: F) -> Result<Self, ResolverError> {
        let mut index = HashMap::with_capacity(candidates.len());
        for (i, record) in candidates.iter().enumerate() {
            if index.insert(record.id.as_str(), i).is_some() {
                return Err(ResolverError::DuplicateId(record.id.clone()));
            }
        }

        Ok(Self {
            candidates,
            index,
            marks: vec![Mark::Unvisited; candidates.len()],
            path: Vec::new(),
            order: Vec::with_capacity(candidates.len()),
            satisfied,
        })
    }

    fn run(mut self) -> Result<Vec<usize>, ResolverError> {
        for i in 0..self.candidates.len() {
            self.visit(i)?;
        }
        Ok(self.order)
    }

    fn visit(&mut self, node: usize) -> Result<(), ResolverError> {
        match self.marks[node] {
            Mark::Done => return Ok(()),
            Mark::Visiting => {
                let start = self.path.iter().position(|&n| n == node).unwrap_or(0);
                let cycle = self.path[start..]
                    .iter()
                    .map(|&n| self.candidates[n].id.clone())
                    .collect();
                return Err(ResolverError::Cycle(cycle));
            }
            Mark::Unvisited => {}
        }

        self.marks[node] = Mark::Visiting;
        self.path.push(node);

        let candidates = self.candidates;
        let record = &candidates[node];
        for dep in &record.dependencies {
            if let Some(&next) = self.index.get(dep.as_str()) {
                self.visit(next)?;
            } else if !(self.satisfied)(dep) {
                return Err(ResolverError::MissingDependency {
                    migration: record.id.clone(),
                    dependency: dep.clone(),
                });
            }
        }

        self.path.pop();
        self.marks[node] = Mark::Done;
        self.order.push(node);
        Ok(())
    }
}

/// Order `candidates` so every migration follows its dependencies.
///
/// A dependency outside the candidate set must appear in `applied`; it is then
/// treated as satisfied and not recursed into.
pub fn resolve(
    candidates: &[MigrationRecord],
    applied: &HashSet<String>,
) -> Result<Vec<MigrationRecord>, ResolverError> {
    let order = Resolver::new(candidates, |dep: &str| applied.contains(dep))?.run()?;
    Ok(order.into_iter().map(|i| candidates[i].clone()).collect())
}

/// Check for duplicate ids and cycles only, without any ledger knowledge.
///
/// Run before touching storage so a malformed graph never reaches the database.
pub fn check_graph(candidates: &[MigrationRecord]) -> Result<(), ResolverError> {
    Resolver::new(candidates, |_: &str| true)?.run().map(drop)
}
