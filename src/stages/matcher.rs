//! Radius matching of binary descriptors by Hamming distance.

use serde::Deserialize;

use super::{DescriptorBuffer, DescriptorMatch, DescriptorMatcher};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MatcherConfig {
    /// Largest accepted number of differing cells. Zero demands an exact match.
    pub max_distance: u32,
}

pub struct DescriptorMatcherRadius {
    config: MatcherConfig,
}

impl DescriptorMatcherRadius {
    pub fn new(config: MatcherConfig) -> Self {
        Self { config }
    }
}

fn hamming(a: &[u8], b: &[u8]) -> u32 {
    a.iter().zip(b.iter()).filter(|(x, y)| x != y).count() as u32
}

impl DescriptorMatcher for DescriptorMatcherRadius {
    fn match_descriptors(
        &self,
        reference: &DescriptorBuffer,
        candidates: &DescriptorBuffer,
    ) -> Vec<DescriptorMatch> {
        if reference.descriptor_size() != candidates.descriptor_size() {
            return Vec::new();
        }
        let mut matches = Vec::new();
        for (index_a, a) in reference.iter().enumerate() {
            for (index_b, b) in candidates.iter().enumerate() {
                let distance = hamming(a, b);
                if distance <= self.config.max_distance {
                    matches.push(DescriptorMatch {
                        index_a,
                        index_b,
                        distance: distance as f32,
                    });
                }
            }
        }
        matches.sort_by(|x, y| x.distance.total_cmp(&y.distance));
        matches
    }
}
