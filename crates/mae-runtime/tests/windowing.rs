//! Windowing, regrouping and reassembly with a deterministic backbone.

mod common;

use std::sync::atomic::Ordering;

use common::{CLS_VALUE, PROBE_DIM, probe_runtime, time_ramp};
use mae_core::PaddingPolicy;

const UNIT: usize = 208;
const TOKENS_PER_WINDOW: usize = 13;
const PATCH_T: usize = 16;

fn expected_tokens(cur_frames: usize) -> usize {
    (cur_frames * TOKENS_PER_WINDOW).div_ceil(UNIT)
}

#[test]
fn test_token_count_matches_duration() {
    for policy in [PaddingPolicy::AlwaysPad, PaddingPolicy::Minimal] {
        let (runtime, _) = probe_runtime(true, policy);
        for cur in [1, 15, 16, 17, 100, 200, 201, 207, 208, 209, 415, 416, 417, 1000] {
            let out = runtime.encode_lms(&time_ramp(1, cur)).unwrap();
            assert_eq!(
                out.dim(1).unwrap(),
                expected_tokens(cur),
                "policy {:?}, cur_frames {}",
                policy,
                cur
            );
            assert_eq!(out.dim(2).unwrap(), 5 * PROBE_DIM);
        }
    }
}

#[test]
fn test_exact_multiple_always_pad_encodes_extra_window() {
    let (runtime, calls) = probe_runtime(false, PaddingPolicy::AlwaysPad);
    let out = runtime.encode_lms(&time_ramp(1, 2 * UNIT)).unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert_eq!(out.dim(1).unwrap(), 2 * TOKENS_PER_WINDOW);
}

#[test]
fn test_exact_multiple_minimal_skips_extra_window() {
    let (runtime, calls) = probe_runtime(false, PaddingPolicy::Minimal);
    let out = runtime.encode_lms(&time_ramp(1, 2 * UNIT)).unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(out.dim(1).unwrap(), 2 * TOKENS_PER_WINDOW);
}

#[test]
fn test_tokens_follow_time_order_across_windows() {
    let (runtime, _) = probe_runtime(true, PaddingPolicy::Minimal);
    let out = runtime.encode_lms(&time_ramp(2, 2 * UNIT)).unwrap();
    let rows = out.get(1).unwrap().to_vec2::<f32>().unwrap();
    assert_eq!(rows.len(), 2 * TOKENS_PER_WINDOW);

    for (i, row) in rows.iter().enumerate() {
        // Кадр j хранит j + 1, патч i покрывает кадры 16i..16i+15.
        let mean = (i * PATCH_T) as f32 + 8.5;
        for f in 0..5 {
            let token = &row[f * PROBE_DIM..(f + 1) * PROBE_DIM];
            assert!((token[0] - mean).abs() < 1e-3, "token {} freq {}", i, f);
            assert_eq!(token[1], f as f32);
            assert_eq!(token[2], (i % TOKENS_PER_WINDOW) as f32);
        }
        assert!(row.iter().all(|v| *v != CLS_VALUE));
    }
}

#[test]
fn test_padded_tail_is_trimmed() {
    let (runtime, _) = probe_runtime(false, PaddingPolicy::AlwaysPad);
    // 100 кадров -> 7 токенов; патч 6 (кадры 96..111) частично в паддинге.
    let out = runtime.encode_lms(&time_ramp(1, 100)).unwrap();
    let rows = out.squeeze(0).unwrap().to_vec2::<f32>().unwrap();
    assert_eq!(rows.len(), 7);

    for (i, row) in rows.iter().enumerate().take(6) {
        assert!((row[0] - ((i * PATCH_T) as f32 + 8.5)).abs() < 1e-3);
    }
}
