//! Difficulty stratifier: labels batches by loss tercile.

use tracing::debug;

use crate::traverse::Batch;

/// Mean loss over a batch's nodes and edges; unset losses count as 0.
pub fn batch_loss(batch: &Batch) -> f64 {
    let count = batch.nodes.len() + batch.edges.len();
    if count == 0 {
        return 0.0;
    }
    let edge_sum: f64 = batch.edges.iter().map(|e| e.loss.unwrap_or(0.0)).sum();
    let node_sum: f64 = batch.nodes.iter().map(|n| n.loss.unwrap_or(0.0)).sum();
    (edge_sum + node_sum) / count as f64
}

/// Set `difficulty` on every batch.
///
/// With losses sorted ascending, `q1 = losses[n/3]` and `q2 = losses[2n/3]`.
/// A batch below `q1` gets `order[0]`, below `q2` gets `order[1]`, anything
/// else `order[2]`. `order` must hold three labels (checked at config load).
pub fn assign_difficulty(batches: &mut [Batch], order: &[String]) {
    if batches.is_empty() || order.len() < 3 {
        return;
    }
    let losses: Vec<f64> = batches.iter().map(batch_loss).collect();
    let mut sorted = losses.clone();
    sorted.sort_by(f64::total_cmp);

    let n = sorted.len();
    let q1 = sorted[n / 3];
    let q2 = sorted[2 * n / 3];
    debug!(batches = n, q1, q2, "difficulty thresholds");

    for (batch, loss) in batches.iter_mut().zip(losses) {
        let label = if loss < q1 {
            &order[0]
        } else if loss < q2 {
            &order[1]
        } else {
            &order[2]
        };
        batch.loss = loss;
        batch.difficulty = Some(label.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Edge, Node};

    fn batch_with_loss(loss: f64) -> Batch {
        let mut e = Edge::new("A", "B", "ab");
        e.loss = Some(loss);
        // one edge, no nodes → batch loss equals edge loss
        Batch::new(Vec::new(), vec![e])
    }

    fn labels(order: [&str; 3]) -> Vec<String> {
        order.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn node_loss_defaults_to_zero() {
        let mut e = Edge::new("A", "B", "ab");
        e.loss = Some(0.9);
        let b = Batch::new(vec![Node::new("A", "T", ""), Node::new("B", "T", "")], vec![e]);
        assert!((batch_loss(&b) - 0.3).abs() < 1e-12);
    }

    #[test]
    fn three_batches_split_evenly() {
        let mut batches = vec![batch_with_loss(0.1), batch_with_loss(0.5), batch_with_loss(0.9)];
        assign_difficulty(&mut batches, &labels(["easy", "medium", "hard"]));
        let got: Vec<_> = batches.iter().map(|b| b.difficulty.clone().unwrap()).collect();
        assert_eq!(got, vec!["easy", "medium", "hard"]);
    }

    #[test]
    fn input_order_does_not_matter() {
        let mut batches = vec![batch_with_loss(0.9), batch_with_loss(0.1), batch_with_loss(0.5)];
        assign_difficulty(&mut batches, &labels(["easy", "medium", "hard"]));
        let got: Vec<_> = batches.iter().map(|b| b.difficulty.clone().unwrap()).collect();
        assert_eq!(got, vec!["hard", "easy", "medium"]);
    }

    #[test]
    fn flat_order_disables_stratification() {
        let mut batches: Vec<_> = [0.2, 0.4, 0.6, 0.8].iter().map(|&l| batch_with_loss(l)).collect();
        assign_difficulty(&mut batches, &labels(["medium", "medium", "medium"]));
        assert!(batches.iter().all(|b| b.difficulty.as_deref() == Some("medium")));
    }

    #[test]
    fn single_batch_is_top_label() {
        let mut batches = vec![batch_with_loss(0.4)];
        assign_difficulty(&mut batches, &labels(["easy", "medium", "hard"]));
        assert_eq!(batches[0].difficulty.as_deref(), Some("hard"));
        assert!((batches[0].loss - 0.4).abs() < 1e-12);
    }

    #[test]
    fn empty_input_is_noop() {
        let mut batches: Vec<Batch> = Vec::new();
        assign_difficulty(&mut batches, &labels(["easy", "medium", "hard"]));
        assert!(batches.is_empty());
    }
}
