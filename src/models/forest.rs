//! Native random forest evaluated directly from a JSON artifact
//!
//! The artifact mirrors the node arrays a tree learner exports:
//!
//! ```json
//! {
//!   "classes": [0, 1],
//!   "feature_names": ["couple", "education", "..."],
//!   "trees": [
//!     {
//!       "nodes": [
//!         {"feature": 4, "threshold": 35.5, "left": 1, "right": 2},
//!         {"value": [30.0, 10.0]},
//!         {"value": [5.0, 55.0]}
//!       ]
//!     }
//!   ]
//! }
//! ```
//!
//! Rows go left when `x <= threshold`. Inputs are compared in single
//! precision, as tree learners store them.

use crate::error::{ModelError, PredictError};
use crate::features::{self, FeatureVector, FEATURE_COUNT};
use crate::models::classifier::Classifier;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct ForestArtifact {
    classes: Vec<i64>,
    #[serde(default)]
    feature_names: Option<Vec<String>>,
    trees: Vec<TreeArtifact>,
}

#[derive(Debug, Deserialize)]
struct TreeArtifact {
    nodes: Vec<NodeArtifact>,
}

#[derive(Debug, Deserialize)]
struct NodeArtifact {
    #[serde(default)]
    feature: Option<i64>,
    #[serde(default)]
    threshold: Option<f64>,
    #[serde(default)]
    left: Option<i64>,
    #[serde(default)]
    right: Option<i64>,
    #[serde(default)]
    value: Option<Vec<f64>>,
}

#[derive(Debug, Clone, PartialEq)]
enum Node {
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf {
        distribution: Vec<f64>,
    },
}

#[derive(Debug, Clone)]
struct Tree {
    nodes: Vec<Node>,
}

impl Tree {
    /// Class distribution of the leaf reached by `row`.
    fn leaf(&self, row: &[f64; FEATURE_COUNT]) -> &[f64] {
        let mut idx = 0;
        loop {
            match &self.nodes[idx] {
                Node::Leaf { distribution } => return distribution,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    let x = row[*feature] as f32 as f64;
                    idx = if x <= *threshold { *left } else { *right };
                }
            }
        }
    }
}

/// Forest of decision trees averaging per-tree class probabilities.
#[derive(Debug, Clone)]
pub struct ForestClassifier {
    classes: Vec<i64>,
    trees: Vec<Tree>,
}

impl ForestClassifier {
    /// Parse and validate a JSON forest artifact.
    pub fn from_json(json: &str) -> Result<Self, ModelError> {
        let artifact: ForestArtifact = serde_json::from_str(json)
            .map_err(|e| ModelError::InvalidArtifact(format!("malformed forest JSON: {}", e)))?;

        if let Some(names) = &artifact.feature_names {
            check_feature_names(names)?;
        }

        let n_classes = artifact.classes.len();
        if n_classes < 2 {
            return Err(ModelError::InvalidArtifact(format!(
                "expected at least 2 classes, got {}",
                n_classes
            )));
        }
        if artifact.trees.is_empty() {
            return Err(ModelError::InvalidArtifact("forest has no trees".to_string()));
        }

        let trees = artifact
            .trees
            .into_iter()
            .enumerate()
            .map(|(t, tree)| compile_tree(t, tree, n_classes))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            classes: artifact.classes,
            trees,
        })
    }

    pub fn tree_count(&self) -> usize {
        self.trees.len()
    }

    pub fn classes(&self) -> &[i64] {
        &self.classes
    }

    fn distribution(&self, row: &FeatureVector) -> Vec<f64> {
        let row = row.as_f64();
        let mut mean = vec![0.0; self.classes.len()];

        for tree in &self.trees {
            for (acc, p) in mean.iter_mut().zip(tree.leaf(&row)) {
                *acc += p;
            }
        }

        let n = self.trees.len() as f64;
        mean.iter_mut().for_each(|p| *p /= n);
        mean
    }

    /// Class with the largest probability; the first maximum wins on ties.
    fn label_of(&self, distribution: &[f64]) -> i64 {
        let best = distribution
            .iter()
            .enumerate()
            .fold(0, |best, (idx, p)| if *p > distribution[best] { idx } else { best });

        self.classes[best]
    }
}

impl Classifier for ForestClassifier {
    fn kind(&self) -> &'static str {
        "forest-json"
    }

    fn classify(&self, row: &FeatureVector) -> Result<i64, PredictError> {
        Ok(self.label_of(&self.distribution(row)))
    }

    fn score(&self, row: &FeatureVector) -> Result<Vec<f64>, PredictError> {
        Ok(self.distribution(row))
    }

    fn classify_and_score(&self, row: &FeatureVector) -> Result<(i64, Vec<f64>), PredictError> {
        let distribution = self.distribution(row);
        Ok((self.label_of(&distribution), distribution))
    }
}

fn check_feature_names(names: &[String]) -> Result<(), ModelError> {
    let expected: Vec<&str> = features::feature_names().collect();
    let actual: Vec<&str> = names.iter().map(String::as_str).collect();

    if actual != expected {
        return Err(ModelError::SchemaMismatch(format!(
            "artifact expects [{}], form provides [{}]",
            actual.join(", "),
            expected.join(", ")
        )));
    }
    Ok(())
}

fn compile_tree(t: usize, tree: TreeArtifact, n_classes: usize) -> Result<Tree, ModelError> {
    let n_nodes = tree.nodes.len();
    if n_nodes == 0 {
        return Err(ModelError::InvalidArtifact(format!("tree {} has no nodes", t)));
    }

    let invalid = |idx: usize, msg: String| {
        ModelError::InvalidArtifact(format!("tree {} node {}: {}", t, idx, msg))
    };

    let mut nodes = Vec::with_capacity(n_nodes);
    for (idx, node) in tree.nodes.into_iter().enumerate() {
        let is_leaf = node.left.map_or(true, |c| c < 0) && node.right.map_or(true, |c| c < 0);

        if is_leaf {
            let value = node
                .value
                .ok_or_else(|| invalid(idx, "leaf without value".to_string()))?;
            if value.len() != n_classes {
                return Err(invalid(
                    idx,
                    format!("leaf has {} values for {} classes", value.len(), n_classes),
                ));
            }
            if value.iter().any(|v| !v.is_finite() || *v < 0.0) {
                return Err(invalid(idx, "leaf values must be finite and non-negative".to_string()));
            }
            let total: f64 = value.iter().sum();
            if total <= 0.0 {
                return Err(invalid(idx, "leaf values sum to zero".to_string()));
            }
            nodes.push(Node::Leaf {
                distribution: value.iter().map(|v| v / total).collect(),
            });
            continue;
        }

        // Children must come after their parent so traversal always terminates.
        let child = |c: Option<i64>, side: &str| -> Result<usize, ModelError> {
            match c {
                Some(c) if c > idx as i64 && (c as usize) < n_nodes => Ok(c as usize),
                other => Err(invalid(idx, format!("invalid {} child {:?}", side, other))),
            }
        };
        let left = child(node.left, "left")?;
        let right = child(node.right, "right")?;

        let feature = match node.feature {
            Some(f) if f >= 0 && (f as usize) < FEATURE_COUNT => f as usize,
            other => return Err(invalid(idx, format!("invalid feature index {:?}", other))),
        };
        let threshold = node
            .threshold
            .filter(|th| !th.is_nan())
            .ok_or_else(|| invalid(idx, "split without threshold".to_string()))?;

        nodes.push(Node::Split {
            feature,
            threshold,
            left,
            right,
        });
    }

    Ok(Tree { nodes })
}
