//! Gradients for layered lerp compositing.
//!
//! Forward (per pixel, channels independent):
//!   accum_0 = background
//!   for i in 0..N:                       (layers in back-to-front order)
//!     accum_{i+1} = lerp(accum_i, c_i, a_i)
//!   out = accum_N
//!
//! where:
//! - `a_i` is the layer's per-pixel alpha (coverage * material alpha)
//! - `c_i` is the layer's color
//! - `accum_i` is the running composite before layer i is applied
//!
//! The backward pass walks the recurrence in reverse, peeling one
//! `(1 - a_i)` factor per layer.

use nalgebra::Vector3;

#[derive(Clone, Debug)]
pub struct CompositeForward {
    pub out: Vector3<f32>,
    /// accum_i for i=0..=N (length N+1); accum_0 is the background.
    pub states: Vec<Vector3<f32>>,
}

/// Forward compositing over a background, saving the accumulator states the
/// backward pass needs.
pub fn composite_forward(
    alphas: &[f32],
    colors: &[Vector3<f32>],
    background: &Vector3<f32>,
) -> CompositeForward {
    assert_eq!(alphas.len(), colors.len());

    let mut states = Vec::with_capacity(alphas.len() + 1);
    let mut accum = *background;
    states.push(accum);

    for (a, c) in alphas.iter().copied().zip(colors.iter().copied()) {
        accum += (c - accum) * a;
        states.push(accum);
    }

    CompositeForward { out: accum, states }
}

#[derive(Clone, Debug)]
pub struct CompositeGrads {
    pub d_alphas: Vec<f32>,
    pub d_colors: Vec<Vector3<f32>>,
    pub d_background: Vector3<f32>,
}

/// Backward pass for layered compositing.
///
/// Inputs:
/// - `alphas`, `colors`: same as forward, back-to-front
/// - `forward`: output of `composite_forward` (contains all accum_i)
/// - `d_out`: upstream gradient dL/d(out)
///
/// Returns gradients w.r.t. alphas, colors, and the background.
pub fn composite_backward(
    alphas: &[f32],
    colors: &[Vector3<f32>],
    forward: &CompositeForward,
    d_out: &Vector3<f32>,
) -> CompositeGrads {
    assert_eq!(alphas.len(), colors.len());
    assert_eq!(forward.states.len(), alphas.len() + 1);

    let n = alphas.len();
    let mut d_alphas = vec![0.0f32; n];
    let mut d_colors = vec![Vector3::<f32>::zeros(); n];

    // accum_{i+1} = accum_i + (c_i - accum_i) * a_i, so:
    //   d accum_{i+1} / d accum_i = 1 - a_i
    //   d accum_{i+1} / d c_i     = a_i
    //   d accum_{i+1} / d a_i     = c_i - accum_i
    let mut g = *d_out; // dL/d(accum_{i+1}) as we walk backwards

    for i in (0..n).rev() {
        let a_i = alphas[i];
        let c_i = colors[i];
        let accum_i = forward.states[i];

        d_colors[i] = g * a_i;
        d_alphas[i] = g.dot(&(c_i - accum_i));
        g *= 1.0 - a_i;
    }

    CompositeGrads {
        d_alphas,
        d_colors,
        d_background: g,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_forward_single_opaque_layer_replaces_background() {
        let fwd = composite_forward(
            &[1.0],
            &[Vector3::new(0.2, 0.4, 0.6)],
            &Vector3::new(0.9, 0.9, 0.9),
        );
        assert_relative_eq!(fwd.out.x, 0.2, epsilon = 1e-6);
        assert_relative_eq!(fwd.out.z, 0.6, epsilon = 1e-6);
    }

    #[test]
    fn test_forward_zero_alpha_keeps_background() {
        let bg = Vector3::new(0.1, 0.2, 0.3);
        let fwd = composite_forward(&[0.0, 0.0], &[Vector3::zeros(), Vector3::zeros()], &bg);
        assert_relative_eq!((fwd.out - bg).norm(), 0.0, epsilon = 1e-6);
    }

    #[test]
    fn test_backward_fully_transparent_routes_to_background() {
        let bg = Vector3::new(0.1, 0.2, 0.3);
        let alphas = [0.0, 0.0];
        let colors = [Vector3::new(1.0, 0.0, 0.0), Vector3::new(0.0, 1.0, 0.0)];
        let fwd = composite_forward(&alphas, &colors, &bg);
        let g = composite_backward(&alphas, &colors, &fwd, &Vector3::new(1.0, 1.0, 1.0));
        assert_relative_eq!((g.d_background - Vector3::new(1.0, 1.0, 1.0)).norm(), 0.0, epsilon = 1e-6);
        assert_relative_eq!(g.d_colors[0].norm(), 0.0, epsilon = 1e-6);
    }

    #[test]
    fn test_backward_opaque_top_layer_blocks_lower_layers() {
        // Top of the back-to-front order is the last entry.
        let bg = Vector3::zeros();
        let alphas = [0.5, 1.0];
        let colors = [Vector3::new(0.3, 0.3, 0.3), Vector3::new(0.8, 0.8, 0.8)];
        let fwd = composite_forward(&alphas, &colors, &bg);
        let g = composite_backward(&alphas, &colors, &fwd, &Vector3::new(1.0, 0.0, 0.0));
        assert_relative_eq!(g.d_colors[0].norm(), 0.0, epsilon = 1e-6);
        assert_relative_eq!(g.d_colors[1].x, 1.0, epsilon = 1e-6);
        assert_relative_eq!(g.d_background.norm(), 0.0, epsilon = 1e-6);
    }
}
