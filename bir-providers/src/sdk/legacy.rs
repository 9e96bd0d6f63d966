//! 0.7 contract: loosely typed methods resolved by name and parameter shape.

use crate::types::Flags;
use anyhow::Result;
use bir_core::Bir;

pub const CHECK_QUALITY: &str = "checkQuality";
pub const MATCH: &str = "match";
pub const COMPOSITE_MATCH: &str = "compositeMatch";
pub const EXTRACT_TEMPLATE: &str = "extractTemplate";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamShape {
    Segment,
    Segments,
    Flags,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegacyMethod {
    pub name: String,
    pub params: Vec<ParamShape>,
}

impl LegacyMethod {
    pub fn new(name: impl Into<String>, params: &[ParamShape]) -> Self {
        Self {
            name: name.into(),
            params: params.to_vec(),
        }
    }
}

/// The four methods a 0.7 backend is expected to carry.
pub fn default_methods() -> Vec<LegacyMethod> {
    let (one, many, flags) = (ParamShape::Segment, ParamShape::Segments, ParamShape::Flags);
    vec![
        LegacyMethod::new(CHECK_QUALITY, &[one, flags]),
        LegacyMethod::new(MATCH, &[one, many, flags]),
        LegacyMethod::new(COMPOSITE_MATCH, &[many, many, flags]),
        LegacyMethod::new(EXTRACT_TEMPLATE, &[one, flags]),
    ]
}

#[derive(Debug, Clone, Copy)]
pub enum LegacyArg<'a> {
    Segment(&'a Bir),
    Segments(&'a [Bir]),
    Flags(&'a Flags),
}

impl LegacyArg<'_> {
    pub fn shape(&self) -> ParamShape {
        match self {
            LegacyArg::Segment(_) => ParamShape::Segment,
            LegacyArg::Segments(_) => ParamShape::Segments,
            LegacyArg::Flags(_) => ParamShape::Flags,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Score {
    /// Normalized 0..=100.
    pub scale_score: f64,
    /// Vendor-specific raw score.
    pub internal_score: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LegacyValue {
    Quality(Score),
    /// One score per gallery segment.
    Scores(Vec<Score>),
    Composite(Score),
    Template(Bir),
}

pub trait LegacySdk: Send + Sync {
    fn methods(&self) -> Vec<LegacyMethod>;

    fn invoke(&self, name: &str, args: &[LegacyArg<'_>]) -> Result<LegacyValue>;
}

/// First advertised method with this name whose parameters fit `shape`.
pub fn find_method<'a>(
    methods: &'a [LegacyMethod],
    name: &str,
    shape: &[ParamShape],
) -> Option<&'a LegacyMethod> {
    methods
        .iter()
        .find(|m| m.name == name && m.params.as_slice() == shape)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn find_by_name_and_shape() {
        let methods = default_methods();
        assert!(find_method(
            &methods,
            MATCH,
            &[ParamShape::Segment, ParamShape::Segments, ParamShape::Flags]
        )
        .is_some());
        assert!(find_method(&methods, MATCH, &[ParamShape::Segments, ParamShape::Segments]).is_none());
        assert!(find_method(&methods, "segment", &[ParamShape::Segment]).is_none());
    }

    #[test]
    fn arg_shapes() {
        let bir = Bir::default();
        let flags = Flags::new();
        let args = [
            LegacyArg::Segment(&bir),
            LegacyArg::Segments(std::slice::from_ref(&bir)),
            LegacyArg::Flags(&flags),
        ];
        let shape: Vec<_> = args.iter().map(LegacyArg::shape).collect();
        assert_eq!(
            shape,
            vec![ParamShape::Segment, ParamShape::Segments, ParamShape::Flags]
        );
    }
}
