//! Spatial separation of clusters after projection.

use crate::types::Position;
use std::f32::consts::TAU;

/// Pulls clusters apart in the projected space.
#[derive(Debug, Clone, Copy)]
pub struct LayoutArranger {
    /// Radius of the circle cluster centers are placed on.
    pub radius: f32,
    /// Factor applied to each member's offset from its cluster centroid.
    pub contraction: f32,
}

impl LayoutArranger {
    pub fn new(radius: f32, contraction: f32) -> Self {
        Self {
            radius,
            contraction,
        }
    }

    /// Contract each cluster around its centroid, then move it onto a circle
    /// in the x/z plane at angle `2π·id/k`. Does nothing when `k <= 1` or the
    /// inputs disagree in length.
    pub fn arrange(&self, positions: &mut [Position], assignments: &[usize], k: usize) {
        if k <= 1 || positions.len() != assignments.len() {
            return;
        }

        for cluster in 0..k {
            let members: Vec<usize> = assignments
                .iter()
                .enumerate()
                .filter(|&(_, &c)| c == cluster)
                .map(|(i, _)| i)
                .collect();
            if members.is_empty() {
                continue;
            }

            let count = members.len() as f32;
            let (mut cx, mut cy, mut cz) = (0.0f32, 0.0f32, 0.0f32);
            for &i in &members {
                cx += positions[i].x / count;
                cy += positions[i].y / count;
                cz += positions[i].z / count;
            }

            let angle = TAU * cluster as f32 / k as f32;
            let (ox, oz) = (angle.cos() * self.radius, angle.sin() * self.radius);

            for &i in &members {
                let p = &mut positions[i];
                p.x = (p.x - cx) * self.contraction + ox;
                p.y = (p.y - cy) * self.contraction;
                p.z = (p.z - cz) * self.contraction + oz;
            }
        }
    }
}
