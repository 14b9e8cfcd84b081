//! Compositing algebra invariants.

use nalgebra::Vector3;

use remat_rs::diff::blend_grad::composite_forward;

#[test]
fn test_composite_associative_front_to_back() {
    // Layers [A, B, C] in front-to-back peel order are folded back-to-front:
    // folding [C, B, A] in one pass must equal folding [C] over the
    // background first, then blending [B, A] on top.
    let bg = Vector3::new(0.05, 0.1, 0.15);
    let colors = [
        Vector3::new(0.9, 0.1, 0.1), // A (front)
        Vector3::new(0.1, 0.9, 0.1), // B
        Vector3::new(0.1, 0.1, 0.9), // C (back)
    ];
    let alphas = [0.6f32, 0.5, 0.4];

    // One pass, back-to-front.
    let full = composite_forward(
        &[alphas[2], alphas[1], alphas[0]],
        &[colors[2], colors[1], colors[0]],
        &bg,
    )
    .out;

    // C beneath first, then [B, A].
    let beneath = composite_forward(&[alphas[2]], &[colors[2]], &bg).out;
    let staged = composite_forward(
        &[alphas[1], alphas[0]],
        &[colors[1], colors[0]],
        &beneath,
    )
    .out;

    assert!((full - staged).norm() < 1e-6, "{full:?} vs {staged:?}");
}

#[test]
fn test_composite_order_sensitivity() {
    // Alpha compositing is order-sensitive: swapping two distinct layers
    // changes the result. Guards against an accidental forward fold.
    let bg = Vector3::zeros();
    let a = Vector3::new(1.0, 0.0, 0.0);
    let b = Vector3::new(0.0, 1.0, 0.0);

    let ab = composite_forward(&[0.5, 0.5], &[a, b], &bg).out;
    let ba = composite_forward(&[0.5, 0.5], &[b, a], &bg).out;
    assert!((ab - ba).norm() > 1e-3);
}

#[test]
fn test_composite_opaque_layer_saturates() {
    let bg = Vector3::new(0.3, 0.3, 0.3);
    let top = Vector3::new(0.8, 0.2, 0.4);
    let out = composite_forward(&[1.0], &[top], &bg).out;
    assert!((out - top).norm() < 1e-6);
}
