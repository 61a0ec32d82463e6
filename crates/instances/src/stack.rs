use glam::Vec3;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use spinfield_common::GenerationParams;

/// Index of an instance, shared by every attribute array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstanceId(pub u32);

impl InstanceId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// One instance's generation-time parameters, gathered from the sibling arrays.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InstanceRecord {
    pub offset: Vec3,
    pub base_scale: f32,
    /// Multiplier applied to the world angle.
    pub spin_rate: f32,
    pub color: Vec3,
}

#[derive(Debug, thiserror::Error)]
pub enum InstanceError {
    #[error("attribute {attribute} has {actual} entries, expected {expected}")]
    LengthMismatch {
        attribute: &'static str,
        expected: usize,
        actual: usize,
    },
    #[error("{0} instances exceed the 32-bit instance index space")]
    TooMany(usize),
}

/// Structure-of-arrays instance parameters.
///
/// Construction goes through [`InstanceStack::from_parts`] (checked) or the
/// generators, so the equal-length invariant holds for every value of this type.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InstanceStack {
    offsets: Vec<[f32; 3]>,
    base_scales: Vec<f32>,
    spin_rates: Vec<f32>,
    colors: Vec<[f32; 3]>,
}

impl InstanceStack {
    pub fn from_parts(
        offsets: Vec<[f32; 3]>,
        base_scales: Vec<f32>,
        spin_rates: Vec<f32>,
        colors: Vec<[f32; 3]>,
    ) -> Result<Self, InstanceError> {
        let expected = offsets.len();
        if expected > u32::MAX as usize {
            return Err(InstanceError::TooMany(expected));
        }
        for (attribute, actual) in [
            ("base_scale", base_scales.len()),
            ("spin_rate", spin_rates.len()),
            ("color", colors.len()),
        ] {
            if actual != expected {
                return Err(InstanceError::LengthMismatch {
                    attribute,
                    expected,
                    actual,
                });
            }
        }
        Ok(Self {
            offsets,
            base_scales,
            spin_rates,
            colors,
        })
    }

    pub fn from_records(records: impl IntoIterator<Item = InstanceRecord>) -> Self {
        let mut stack = Self::default();
        for r in records {
            stack.offsets.push(r.offset.to_array());
            stack.base_scales.push(r.base_scale);
            stack.spin_rates.push(r.spin_rate);
            stack.colors.push(r.color.to_array());
        }
        stack
    }

    /// Sample `count` instances inside the configured volume.
    ///
    /// The maximum scale shrinks with the instance count (see
    /// [`GenerationParams::max_scale`]) so runs at different counts fill the
    /// volume to a similar degree. The same seed always yields the same stack.
    pub fn generate(count: u32, params: &GenerationParams, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let max_scale = params.max_scale(count);
        let n = count as usize;
        let mut stack = Self {
            offsets: Vec::with_capacity(n),
            base_scales: Vec::with_capacity(n),
            spin_rates: Vec::with_capacity(n),
            colors: Vec::with_capacity(n),
        };
        let range = |rng: &mut StdRng, [lo, hi]: [f32; 2]| rng.random_range(lo..=hi);
        for _ in 0..count {
            stack.offsets.push([
                range(&mut rng, params.x_range),
                range(&mut rng, params.y_range),
                range(&mut rng, params.z_range),
            ]);
            stack
                .base_scales
                .push(range(&mut rng, [params.min_scale, max_scale]));
            stack.spin_rates.push(range(&mut rng, params.spin_range));
            stack
                .colors
                .push([rng.random::<f32>(), rng.random::<f32>(), rng.random::<f32>()]);
        }
        tracing::info!(count, max_scale, seed, "generated instance stack");
        stack
    }

    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    pub fn get(&self, id: InstanceId) -> Option<InstanceRecord> {
        let i = id.index();
        Some(InstanceRecord {
            offset: Vec3::from_array(*self.offsets.get(i)?),
            base_scale: self.base_scales[i],
            spin_rate: self.spin_rates[i],
            color: Vec3::from_array(self.colors[i]),
        })
    }

    pub fn ids(&self) -> impl Iterator<Item = InstanceId> + use<> {
        (0..self.len() as u32).map(InstanceId)
    }

    pub fn iter(&self) -> impl Iterator<Item = (InstanceId, InstanceRecord)> + '_ {
        self.ids().filter_map(|id| self.get(id).map(|r| (id, r)))
    }

    pub fn offsets(&self) -> &[[f32; 3]] {
        &self.offsets
    }

    pub fn base_scales(&self) -> &[f32] {
        &self.base_scales
    }

    pub fn spin_rates(&self) -> &[f32] {
        &self.spin_rates
    }

    pub fn colors(&self) -> &[[f32; 3]] {
        &self.colors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_parts_rejects_ragged_arrays() {
        let err = InstanceStack::from_parts(
            vec![[0.0; 3]; 3],
            vec![1.0; 3],
            vec![1.0; 2],
            vec![[0.0; 3]; 3],
        )
        .unwrap_err();
        assert!(matches!(
            err,
            InstanceError::LengthMismatch {
                attribute: "spin_rate",
                expected: 3,
                actual: 2
            }
        ));
    }

    #[test]
    fn from_parts_accepts_equal_lengths() {
        let stack = InstanceStack::from_parts(
            vec![[1.0, 2.0, 3.0]],
            vec![2.0],
            vec![0.5],
            vec![[0.1, 0.2, 0.3]],
        )
        .unwrap();
        let r = stack.get(InstanceId(0)).unwrap();
        assert_eq!(r.offset, Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(r.base_scale, 2.0);
        assert_eq!(r.spin_rate, 0.5);
        assert!(stack.get(InstanceId(1)).is_none());
    }

    #[test]
    fn generate_keeps_arrays_aligned() {
        let stack = InstanceStack::generate(1_000, &GenerationParams::default(), 1);
        assert_eq!(stack.len(), 1_000);
        assert_eq!(stack.offsets().len(), 1_000);
        assert_eq!(stack.base_scales().len(), 1_000);
        assert_eq!(stack.spin_rates().len(), 1_000);
        assert_eq!(stack.colors().len(), 1_000);
    }

    #[test]
    fn generate_respects_ranges() {
        let params = GenerationParams::default();
        let count = 5_000;
        let max_scale = params.max_scale(count);
        let stack = InstanceStack::generate(count, &params, 9);
        for (_, r) in stack.iter() {
            assert!((-75.0..=75.0).contains(&r.offset.x));
            assert!((-75.0..=75.0).contains(&r.offset.y));
            assert!((25.0..=175.0).contains(&r.offset.z));
            assert!((params.min_scale..=max_scale).contains(&r.base_scale));
            assert!((0.25..=4.0).contains(&r.spin_rate));
            for c in r.color.to_array() {
                assert!((0.0..1.0).contains(&c));
            }
        }
    }

    #[test]
    fn generate_is_deterministic_per_seed() {
        let params = GenerationParams::default();
        let a = InstanceStack::generate(64, &params, 42);
        let b = InstanceStack::generate(64, &params, 42);
        let c = InstanceStack::generate(64, &params, 43);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn ids_cover_every_instance_once() {
        let stack = InstanceStack::generate(10, &GenerationParams::default(), 0);
        let ids: Vec<_> = stack.ids().collect();
        assert_eq!(ids.len(), 10);
        assert_eq!(ids[9], InstanceId(9));
    }
}
