use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectOption {
    pub id: String,
    pub label: String,
}

/// Option set of `node` given the selected id of its parent (`None` for roots).
pub trait OptionResolver {
    fn options(&self, node: &str, parent_id: Option<&str>) -> anyhow::Result<Vec<SelectOption>>;
}

#[derive(Debug, Error)]
pub enum SelectorError {
    #[error("unknown selector {0:?}")]
    UnknownNode(String),
    #[error("selector {node:?} has no option {value:?}")]
    NotAnOption { node: String, value: String },
    #[error("invalid selector graph: {0}")]
    BadGraph(String),
    #[error("failed to resolve options: {0}")]
    Resolver(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectorNode {
    pub name: String,
    #[serde(default)]
    pub parent: Option<String>,
}

/// Dependent selectors as a forest. Nodes are kept parents-first.
#[derive(Debug, Clone)]
pub struct SelectorGraph {
    nodes: Vec<SelectorNode>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectorState {
    pub selected: BTreeMap<String, String>,
    pub options: BTreeMap<String, Vec<SelectOption>>,
}

impl SelectorGraph {
    pub fn new(nodes: Vec<SelectorNode>) -> Result<Self, SelectorError> {
        for (i, n) in nodes.iter().enumerate() {
            if nodes[..i].iter().any(|m| m.name == n.name) {
                return Err(SelectorError::BadGraph(format!("duplicate node {:?}", n.name)));
            }
            if let Some(p) = &n.parent {
                // Declared-before rule also rules out cycles.
                if !nodes[..i].iter().any(|m| &m.name == p) {
                    return Err(SelectorError::BadGraph(format!(
                        "parent {p:?} of {:?} must be declared first",
                        n.name
                    )));
                }
            }
        }
        Ok(Self { nodes })
    }

    /// course -> subject -> week -> period
    pub fn course_chain() -> Self {
        let chain = ["course", "subject", "week", "period"];
        let nodes = chain
            .iter()
            .enumerate()
            .map(|(i, name)| SelectorNode {
                name: name.to_string(),
                parent: i.checked_sub(1).map(|p| chain[p].to_string()),
            })
            .collect();
        Self { nodes }
    }

    fn contains(&self, node: &str) -> bool {
        self.nodes.iter().any(|n| n.name == node)
    }

    pub fn descendants(&self, node: &str) -> Vec<&str> {
        let mut out: Vec<&str> = Vec::new();
        for n in &self.nodes {
            if let Some(p) = n.parent.as_deref() {
                if p == node || out.contains(&p) {
                    out.push(&n.name);
                }
            }
        }
        out
    }

    /// Re-derive every option set top-down from `selected`. A selection that
    /// is no longer offered is dropped, which in turn empties its subtree.
    pub fn resolve<R>(
        &self,
        selected: &BTreeMap<String, String>,
        resolver: &R,
    ) -> Result<SelectorState, SelectorError>
    where
        R: OptionResolver + ?Sized,
    {
        let mut state = SelectorState::default();
        for n in &self.nodes {
            let options = match n.parent.as_deref() {
                None => resolver.options(&n.name, None),
                Some(p) => match state.selected.get(p) {
                    Some(pid) => resolver.options(&n.name, Some(pid)),
                    None => Ok(Vec::new()),
                },
            }
            .map_err(|e| SelectorError::Resolver(format!("{e:#}")))?;

            if let Some(v) = selected.get(&n.name) {
                if options.iter().any(|o| &o.id == v) {
                    state.selected.insert(n.name.clone(), v.clone());
                }
            }
            state.options.insert(n.name.clone(), options);
        }
        Ok(state)
    }

    /// Select `value` at `node`, resetting every descendant.
    pub fn select<R>(
        &self,
        selected: &BTreeMap<String, String>,
        node: &str,
        value: &str,
        resolver: &R,
    ) -> Result<SelectorState, SelectorError>
    where
        R: OptionResolver + ?Sized,
    {
        if !self.contains(node) {
            return Err(SelectorError::UnknownNode(node.to_string()));
        }
        let current = self.resolve(selected, resolver)?;
        let offered = current
            .options
            .get(node)
            .is_some_and(|opts| opts.iter().any(|o| o.id == value));
        if !offered {
            return Err(SelectorError::NotAnOption {
                node: node.to_string(),
                value: value.to_string(),
            });
        }

        let mut next = current.selected;
        for d in self.descendants(node) {
            next.remove(d);
        }
        next.insert(node.to_string(), value.to_string());
        self.resolve(&next, resolver)
    }
}
