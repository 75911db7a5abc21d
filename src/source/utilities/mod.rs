/// Remote response normalization into canonical records.
pub mod normalize;
