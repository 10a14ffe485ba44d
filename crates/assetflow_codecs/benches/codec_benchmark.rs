//! # Codec Benchmark
//!
//! Decode throughput for the mesh and animation codecs on synthetic assets
//! shaped like typical avatar attachments.
//!
//! Run with: `cargo bench --package assetflow_codecs`

#![allow(missing_docs)]

use assetflow_codecs::animation::{AnimationCodec, AnimationHeader, DecodedAnimation, JointMotion, Keyframe};
use assetflow_codecs::mesh::{FaceData, LodLevel, MeshBuilder, MeshCodec, MeshParams, SkinData};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

/// Grid face with `side * side` vertices, rigged to four joints.
fn grid_face(side: u16) -> FaceData {
    let mut positions = Vec::new();
    let mut uvs = Vec::new();
    let mut influences = Vec::new();
    for y in 0..side {
        for x in 0..side {
            let (fx, fy) = (f32::from(x), f32::from(y));
            positions.push([fx, fy, (fx * 0.3).sin()]);
            uvs.push([fx / f32::from(side), fy / f32::from(side)]);
            influences.push(vec![(0, 0.4), (1, 0.3), (2, 0.2), (3, 0.1)]);
        }
    }
    let mut indices = Vec::new();
    for y in 0..side - 1 {
        for x in 0..side - 1 {
            let i = y * side + x;
            indices.extend_from_slice(&[i, i + 1, i + side, i + 1, i + side + 1, i + side]);
        }
    }
    let count = positions.len();
    FaceData {
        positions,
        normals: Some(vec![[0.0, 0.0, 1.0]; count]),
        uvs: Some(uvs),
        indices,
        influences: Some(influences),
    }
}

fn rigged_mesh(side: u16, faces: usize) -> Vec<u8> {
    let identity = {
        let mut m = [0.0f32; 16];
        for i in 0..4 {
            m[i * 5] = 1.0;
        }
        m
    };
    let skin = SkinData {
        joint_names: (0..4).map(|i| format!("mJoint{i}")).collect(),
        inverse_bind_matrices: vec![identity; 4],
        bind_shape_matrix: Some(identity),
        ..SkinData::default()
    };
    MeshBuilder::new()
        .with_lod(LodLevel::High, vec![grid_face(side); faces])
        .with_lod(LodLevel::Low, vec![grid_face(side / 4); faces])
        .with_skin(skin)
        .build()
        .expect("benchmark mesh encodes")
}

fn animation(joints: usize, keys: u16) -> Vec<u8> {
    let duration = 4.0;
    let track = |offset: f32| -> Vec<Keyframe> {
        (0..keys)
            .map(|k| {
                let t = duration * f32::from(k) / f32::from(keys);
                Keyframe::from_position(t, duration, [offset, t.sin(), t.cos()])
            })
            .collect()
    };
    let anim = DecodedAnimation {
        header: AnimationHeader { duration, ..AnimationHeader::default() },
        joints: (0..joints)
            .map(|j| JointMotion {
                name: format!("mBone{j}"),
                priority: 1,
                rotation_keys: track(0.1),
                position_keys: track(0.2),
            })
            .collect(),
        constraints: Vec::new(),
    };
    AnimationCodec::encode(&anim).expect("benchmark animation encodes")
}

fn bench_mesh_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("mesh_decode");
    let params = MeshParams::for_lods(&[LodLevel::High, LodLevel::Low]);

    for side in [16u16, 64, 128] {
        let data = rigged_mesh(side, 4);
        group.throughput(Throughput::Bytes(data.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(side), &data, |b, data| {
            b.iter(|| MeshCodec::decode(black_box(data), &params));
        });
    }

    group.finish();
}

fn bench_animation_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("animation_decode");

    for joints in [10usize, 60, 130] {
        let data = animation(joints, 120);
        group.throughput(Throughput::Bytes(data.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(joints), &data, |b, data| {
            b.iter(|| AnimationCodec::decode(black_box(data)));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_mesh_decode, bench_animation_decode);
criterion_main!(benches);
