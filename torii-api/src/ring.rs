//! # Replication Ring
//!
//! Fixed topology plus rendezvous hashing. Every node sorts the same
//! endpoint set at startup, so node ids and per-key replica rankings are
//! identical across the cluster without any coordination.

use torii_core::{Error, Result};

/// The immutable cluster membership as seen by one node.
pub struct Topology {
    endpoints: Vec<String>,
    me: usize,
}

impl Topology {
    /// Sort the endpoint set and locate this node in it.
    pub fn new(mut endpoints: Vec<String>, self_endpoint: &str) -> Result<Self> {
        if endpoints.is_empty() {
            return Err(Error::Cluster {
                message: "topology is empty".to_string(),
            });
        }
        endpoints.sort();
        endpoints.dedup();

        let me = endpoints
            .iter()
            .position(|endpoint| endpoint == self_endpoint)
            .ok_or_else(|| Error::Cluster {
                message: format!("own endpoint {self_endpoint} not in topology"),
            })?;

        Ok(Self { endpoints, me })
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }

    /// This node's stable id: its index in the sorted endpoint list.
    pub fn node_id(&self) -> usize {
        self.me
    }

    pub fn is_me(&self, node: usize) -> bool {
        node == self.me
    }

    pub fn endpoint(&self, node: usize) -> &str {
        &self.endpoints[node]
    }

    /// Rendezvous ranking for `key`: every node scored by a stable 32-bit
    /// hash of `endpoint ‖ key`, ranked ascending with ties broken by
    /// index. The result is a permutation of `[0, len)` on which all
    /// nodes agree; coordinators take its first `from` entries as the
    /// replica set.
    pub fn rank(&self, key: &str) -> Vec<usize> {
        let mut scored: Vec<(u32, usize)> = self
            .endpoints
            .iter()
            .enumerate()
            .map(|(node, endpoint)| {
                let mut hasher = crc32fast::Hasher::new();
                hasher.update(endpoint.as_bytes());
                hasher.update(key.as_bytes());
                (hasher.finalize(), node)
            })
            .collect();
        scored.sort();
        scored.into_iter().map(|(_, node)| node).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn endpoints() -> Vec<String> {
        vec![
            "http://10.0.0.1:8000".to_string(),
            "http://10.0.0.2:8000".to_string(),
            "http://10.0.0.3:8000".to_string(),
        ]
    }

    #[test]
    fn test_node_id_is_position_in_sorted_list() {
        let shuffled = vec![
            "http://10.0.0.3:8000".to_string(),
            "http://10.0.0.1:8000".to_string(),
            "http://10.0.0.2:8000".to_string(),
        ];
        let topology = Topology::new(shuffled, "http://10.0.0.2:8000").unwrap();
        assert_eq!(topology.node_id(), 1);
        assert_eq!(topology.endpoint(0), "http://10.0.0.1:8000");
    }

    #[test]
    fn test_unknown_self_endpoint_is_rejected() {
        assert!(Topology::new(endpoints(), "http://10.9.9.9:8000").is_err());
        assert!(Topology::new(Vec::new(), "http://10.0.0.1:8000").is_err());
    }

    #[test]
    fn test_rank_is_a_permutation() {
        let topology = Topology::new(endpoints(), "http://10.0.0.1:8000").unwrap();
        for key in ["k1", "k2", "another-key", "x"] {
            let mut ranking = topology.rank(key);
            assert_eq!(ranking.len(), 3);
            ranking.sort();
            assert_eq!(ranking, vec![0, 1, 2]);
        }
    }

    #[test]
    fn test_all_nodes_agree_on_ranking() {
        // Each node sees the topology in whatever order it was
        // configured; rankings must still match.
        let a = Topology::new(endpoints(), "http://10.0.0.1:8000").unwrap();
        let mut reversed = endpoints();
        reversed.reverse();
        let b = Topology::new(reversed, "http://10.0.0.3:8000").unwrap();

        for key in ["k1", "k2", "k3", "some-longer-key"] {
            assert_eq!(a.rank(key), b.rank(key));
        }
    }

    #[test]
    fn test_different_keys_spread_across_nodes() {
        let topology = Topology::new(endpoints(), "http://10.0.0.1:8000").unwrap();
        let mut leaders = std::collections::HashSet::new();
        for i in 0..64 {
            leaders.insert(topology.rank(&format!("key-{i}"))[0]);
        }
        assert_eq!(leaders.len(), 3);
    }
}
