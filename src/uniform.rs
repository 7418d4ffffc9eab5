//! Named shader parameters
//!
//! Uniforms are owned value slots on a node's material: mutated in place by
//! `update()`/`render()` and read by the pipeline at draw time, never copied
//! into the pipeline itself.

use glam::{Mat4, Vec2, Vec3};

/// A typed uniform value
#[derive(Debug, Clone, PartialEq)]
pub enum UniformValue {
    Float(f32),
    Int(i32),
    Vec2(Vec2),
    Vec3(Vec3),
    Mat4(Mat4),
    Vec2Array(Vec<Vec2>),
}

impl UniformValue {
    pub fn as_float(&self) -> Option<f32> {
        match self {
            UniformValue::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i32> {
        match self {
            UniformValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_vec2(&self) -> Option<Vec2> {
        match self {
            UniformValue::Vec2(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_mat4(&self) -> Option<Mat4> {
        match self {
            UniformValue::Mat4(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_vec2_array(&self) -> Option<&[Vec2]> {
        match self {
            UniformValue::Vec2Array(v) => Some(v),
            _ => None,
        }
    }
}

/// An ordered collection of named uniforms
#[derive(Debug, Clone, Default)]
pub struct UniformSet {
    entries: Vec<(String, UniformValue)>,
}

impl UniformSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a uniform, or overwrite its value in place.
    pub fn set(&mut self, name: &str, value: UniformValue) {
        if let Some(entry) = self.entries.iter_mut().find(|(n, _)| n == name) {
            entry.1 = value;
        } else {
            self.entries.push((name.to_string(), value));
        }
    }

    pub fn get(&self, name: &str) -> Option<&UniformValue> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &UniformValue)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_overwrites_in_place() {
        let mut uniforms = UniformSet::new();
        uniforms.set("bias", UniformValue::Float(0.01));
        uniforms.set("radius", UniformValue::Float(0.05));
        uniforms.set("bias", UniformValue::Float(0.02));

        assert_eq!(uniforms.len(), 2);
        assert_eq!(uniforms.get("bias").and_then(|v| v.as_float()), Some(0.02));
        // Order is preserved across overwrites
        let names: Vec<_> = uniforms.iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["bias", "radius"]);
    }
}
