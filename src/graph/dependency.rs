//! DependencyGraph: dependency relation, source order and fetch groups
//!
//! Built once from the registered sources. The relation is asked of every
//! unordered pair of sources; cycles are rejected before anything is
//! recorded for the offending pair.

use crate::source::{Source, SourceId};
use std::collections::BTreeSet;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

/// Errors raised while building a dependency graph
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    #[error("sources {first} and {second} depend on each other")]
    CircularDependency { first: String, second: String },

    #[error("source {dependent} depending on {dependency} would close a dependency cycle")]
    IndirectCircularDependency {
        dependent: String,
        dependency: String,
    },
}

/// Result type for graph construction
pub type GraphResult<T> = Result<T, GraphError>;

/// Dependency relation among registered sources.
///
/// `order` is a topological order where every source comes after its
/// dependencies; among sources free to go next, the lowest registration
/// index goes first. `groups` partitions `order` into waves that can be
/// fetched concurrently.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    order: Vec<SourceId>,
    dependencies: Vec<BTreeSet<SourceId>>,
    reverse: Vec<BTreeSet<SourceId>>,
    groups: Vec<Vec<SourceId>>,
}

impl DependencyGraph {
    /// Derive the relation, order and groups for `sources`.
    ///
    /// Source ids are positions in `sources`.
    pub fn build(sources: &[Arc<dyn Source>]) -> GraphResult<Self> {
        let count = sources.len();
        let mut dependencies = vec![BTreeSet::new(); count];
        let mut reverse = vec![BTreeSet::new(); count];

        for i in 0..count {
            for j in (i + 1)..count {
                let i_on_j = sources[i].depends_on(sources[j].as_ref());
                let j_on_i = sources[j].depends_on(sources[i].as_ref());
                let (dependent, dependency) = match (i_on_j, j_on_i) {
                    (true, true) => {
                        return Err(GraphError::CircularDependency {
                            first: sources[i].name().to_string(),
                            second: sources[j].name().to_string(),
                        })
                    }
                    (true, false) => (i, j),
                    (false, true) => (j, i),
                    (false, false) => continue,
                };
                if reaches(&dependencies, dependency, dependent) {
                    return Err(GraphError::IndirectCircularDependency {
                        dependent: sources[dependent].name().to_string(),
                        dependency: sources[dependency].name().to_string(),
                    });
                }
                dependencies[dependent].insert(SourceId(dependency));
                reverse[dependency].insert(SourceId(dependent));
            }
        }

        let order = topological_order(&dependencies);
        let groups = group(&order, &dependencies);
        debug!(
            sources = count,
            groups = groups.len(),
            "built dependency graph"
        );

        Ok(Self {
            order,
            dependencies,
            reverse,
            groups,
        })
    }

    /// Every source id, dependencies before dependents.
    pub fn order(&self) -> &[SourceId] {
        &self.order
    }

    /// Direct dependencies of `id`.
    pub fn dependencies(&self, id: SourceId) -> &BTreeSet<SourceId> {
        &self.dependencies[id.index()]
    }

    /// Sources that directly depend on `id`, ascending.
    pub fn reverse_dependencies(&self, id: SourceId) -> &BTreeSet<SourceId> {
        &self.reverse[id.index()]
    }

    /// Fetch waves, in execution order.
    pub fn groups(&self) -> &[Vec<SourceId>] {
        &self.groups
    }

    /// True if `dependent` directly depends on `dependency`.
    pub fn depends_on(&self, dependent: SourceId, dependency: SourceId) -> bool {
        self.dependencies
            .get(dependent.index())
            .is_some_and(|set| set.contains(&dependency))
    }

    /// Index of the group containing `id`.
    pub fn group_of(&self, id: SourceId) -> Option<usize> {
        self.groups.iter().position(|group| group.contains(&id))
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

/// True if `to` is reachable from `from` through recorded dependencies.
fn reaches(dependencies: &[BTreeSet<SourceId>], from: usize, to: usize) -> bool {
    let mut visited = vec![false; dependencies.len()];
    let mut stack = vec![from];
    while let Some(current) = stack.pop() {
        if current == to {
            return true;
        }
        if std::mem::replace(&mut visited[current], true) {
            continue;
        }
        stack.extend(dependencies[current].iter().map(|id| id.index()));
    }
    false
}

/// Kahn's algorithm, always taking the lowest ready id.
fn topological_order(dependencies: &[BTreeSet<SourceId>]) -> Vec<SourceId> {
    let mut waiting: Vec<usize> = dependencies.iter().map(BTreeSet::len).collect();
    let mut dependents = vec![Vec::new(); dependencies.len()];
    for (dependent, deps) in dependencies.iter().enumerate() {
        for dependency in deps {
            dependents[dependency.index()].push(dependent);
        }
    }

    let mut ready: BTreeSet<usize> = (0..dependencies.len())
        .filter(|&id| waiting[id] == 0)
        .collect();
    let mut order = Vec::with_capacity(dependencies.len());
    while let Some(next) = ready.pop_first() {
        order.push(SourceId(next));
        for &dependent in &dependents[next] {
            waiting[dependent] -= 1;
            if waiting[dependent] == 0 {
                ready.insert(dependent);
            }
        }
    }
    order
}

/// Scan `order`, closing the open group whenever the next source depends
/// on a member of it.
fn group(order: &[SourceId], dependencies: &[BTreeSet<SourceId>]) -> Vec<Vec<SourceId>> {
    let mut groups = Vec::new();
    let mut open: Vec<SourceId> = Vec::new();
    for &id in order {
        let blocked = open
            .iter()
            .any(|member| dependencies[id.index()].contains(member));
        if blocked {
            groups.push(std::mem::take(&mut open));
        }
        open.push(id);
    }
    if !open.is_empty() {
        groups.push(open);
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::Page;
    use crate::source::FindResult;
    use async_trait::async_trait;

    /// Source depending on other sources by name.
    struct Named {
        name: &'static str,
        needs: Vec<&'static str>,
    }

    #[async_trait]
    impl Source for Named {
        fn name(&self) -> &str {
            self.name
        }

        fn depends_on(&self, other: &dyn Source) -> bool {
            self.needs.iter().any(|need| *need == other.name())
        }

        async fn find(&self, _page: &Page) -> FindResult {
            Ok(Vec::new())
        }
    }

    fn sources(table: &[(&'static str, &[&'static str])]) -> Vec<Arc<dyn Source>> {
        table.iter()
            .map(|&(name, needs)| {
                Arc::new(Named {
                    name,
                    needs: needs.to_vec(),
                }) as Arc<dyn Source>
            })
            .collect()
    }

    fn ids(raw: &[usize]) -> Vec<SourceId> {
        raw.iter().copied().map(SourceId).collect()
    }

    // === Scenario: independent sources share one wave ===

    #[test]
    fn independent_sources_form_one_group() {
        let graph = DependencyGraph::build(&sources(&[("a", &[]), ("b", &[]), ("c", &[])])).unwrap();
        assert_eq!(graph.order(), ids(&[0, 1, 2]).as_slice());
        assert_eq!(graph.groups(), &[ids(&[0, 1, 2])]);
    }

    // === Scenario: dependents follow their dependencies ===

    #[test]
    fn dependent_registered_first_sorts_after_dependency() {
        let graph =
            DependencyGraph::build(&sources(&[("header", &["letters"]), ("letters", &[])])).unwrap();

        assert_eq!(graph.order(), ids(&[1, 0]).as_slice());
        assert_eq!(graph.groups(), &[ids(&[1]), ids(&[0])]);
        assert!(graph.depends_on(SourceId(0), SourceId(1)));
        assert!(!graph.depends_on(SourceId(1), SourceId(0)));
        assert!(graph.reverse_dependencies(SourceId(1)).contains(&SourceId(0)));
    }

    #[test]
    fn chain_produces_one_group_per_link() {
        let graph = DependencyGraph::build(&sources(&[
            ("a", &[]),
            ("b", &["a"]),
            ("c", &["b"]),
            ("d", &[]),
        ]))
        .unwrap();

        assert_eq!(graph.order(), ids(&[0, 1, 2, 3]).as_slice());
        assert_eq!(graph.groups(), &[ids(&[0]), ids(&[1]), ids(&[2, 3])]);
        assert_eq!(graph.group_of(SourceId(3)), Some(2));
    }

    #[test]
    fn every_dependency_lands_in_an_earlier_group() {
        let graph = DependencyGraph::build(&sources(&[
            ("ads", &["letters"]),
            ("letters", &[]),
            ("headers", &["letters"]),
            ("pagination", &["letters", "ads", "headers"]),
            ("footer", &["headers"]),
        ]))
        .unwrap();

        let flattened: Vec<SourceId> = graph.groups().iter().flatten().copied().collect();
        assert_eq!(flattened, graph.order());
        for id in graph.order() {
            for dependency in graph.dependencies(*id) {
                assert!(graph.group_of(*dependency) < graph.group_of(*id));
            }
        }
    }

    // === Scenario: cycles are fatal ===

    #[test]
    fn mutual_dependency_is_rejected() {
        let result = DependencyGraph::build(&sources(&[("a", &["b"]), ("b", &["a"])]));
        assert_eq!(
            result.unwrap_err(),
            GraphError::CircularDependency {
                first: "a".into(),
                second: "b".into()
            }
        );
    }

    #[test]
    fn transitive_cycle_is_rejected() {
        let result =
            DependencyGraph::build(&sources(&[("a", &["b"]), ("b", &["c"]), ("c", &["a"])]));
        assert!(matches!(
            result,
            Err(GraphError::IndirectCircularDependency { .. })
        ));
    }

    #[test]
    fn empty_source_set_builds_empty_graph() {
        let graph = DependencyGraph::build(&[]).unwrap();
        assert!(graph.is_empty());
        assert!(graph.groups().is_empty());
    }
}
