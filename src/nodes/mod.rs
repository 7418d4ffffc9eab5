//! Deferred-pipeline graph nodes

pub mod hbao;
pub mod shadow;

pub use hbao::{HbaoAttributes, HbaoNode};
pub use shadow::{
    ShadowAttributes, ShadowMappingNode, ShadowPassConfig, DEFAULT_LIGHT_DIRECTION,
};
