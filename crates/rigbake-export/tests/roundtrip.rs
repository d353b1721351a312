use glam::{Mat4, Quat, Vec2, Vec3};
use proptest::prelude::*;
use rigbake_export::{AssetSerializer, ExportOptions, ExportPipeline, ExportedAsset, SkeletonBuilder};
use rigbake_export::{MeshSkinner, SamplingMode};
use rigbake_parsers::{AnimParser, Parser};
use rigbake_scene::{
    Action, Bone, GroupWeight, MemoryScene, Mesh, MeshLoop, MeshVertex, Polygon, UvLayer, VertexGroups,
};

fn rest(i: usize) -> Mat4 {
    Mat4::from_rotation_translation(
        Quat::from_rotation_y(i as f32 * 0.37),
        Vec3::new(0.0, i as f32 * 0.75, 0.1),
    )
}

fn limb(bones: usize) -> Vec<Bone> {
    (0..bones)
        .map(|i| {
            let bone = Bone::new(format!("bone_{i}"), rest(i));
            if i == 0 {
                bone
            } else {
                bone.with_parent(format!("bone_{}", i - 1))
            }
        })
        .collect()
}

/// A pentagon whose vertices blend between neighbouring bones
fn pentagon(bones: u32) -> Mesh {
    let vertices = (0..5)
        .map(|i| {
            let angle = i as f32 / 5.0 * std::f32::consts::TAU;
            MeshVertex {
                position: Vec3::new(angle.cos(), angle.sin(), 0.0),
                groups: vec![
                    GroupWeight { group: i % bones, weight: 0.75 },
                    GroupWeight { group: (i + 1) % bones, weight: 0.25 },
                ],
            }
        })
        .collect();

    Mesh {
        vertices,
        loops: (0..5).map(|vertex| MeshLoop { vertex, normal: Vec3::Z }).collect(),
        polygons: vec![Polygon { loop_start: 0, loop_total: 5 }],
        uv_layers: vec![UvLayer {
            name: "UVMap".into(),
            data: (0..5).map(|i| Vec2::new(i as f32 * 0.2, 0.5)).collect(),
        }],
    }
}

fn scene(bones: usize) -> MemoryScene {
    let mut scene = MemoryScene::new(30.0);
    scene.add_armature("Rig", limb(bones));
    scene.add_mesh_object(
        "Body",
        pentagon(bones as u32),
        (0..bones as u32).map(|i| (i, format!("bone_{i}"))).collect(),
    );
    scene.add_action(Action::new("Swing", 10.0, 13.0));
    for frame in 10..=13 {
        let mut world = Mat4::IDENTITY;
        for i in 0..bones {
            world = world * rest(i) * Mat4::from_rotation_z(frame as f32 * 0.05);
            scene.add_pose_key("Swing", "Rig", &format!("bone_{i}"), frame, world).unwrap();
        }
    }
    scene
}

fn assert_matrix_close(actual: Mat4, expected: Mat4) {
    assert!(
        actual.abs_diff_eq(expected, 1e-5),
        "matrices differ:\n{actual:?}\n{expected:?}"
    );
}

#[test]
fn test_pipeline_output_reads_back() {
    let mut scene = scene(3);
    let asset = ExportPipeline::new(ExportOptions::for_mesh("Body")).run(&mut scene).unwrap();
    let text = AssetSerializer::new().to_string(&asset).unwrap();
    let parsed = AnimParser::new().parse_str(&text).unwrap();

    assert!(parsed.validate().is_empty(), "{:?}", parsed.validate());

    assert_eq!(parsed.nodes.len(), asset.skeleton.len());
    for (read, built) in parsed.nodes.iter().zip(asset.skeleton.nodes()) {
        assert_eq!(read.name, built.name);
        assert_eq!(read.parent, built.parent_index());
        assert_matrix_close(read.inverse_bind_matrix(), built.inverse_bind);
    }

    // A pentagon is three triangles
    assert_eq!(parsed.vertices.len(), 9);
    assert_eq!(parsed.indices, (0..9).collect::<Vec<u32>>());
    for (read, built) in parsed.vertices.iter().zip(&asset.mesh.vertices) {
        let indices: Vec<u32> = built.influences.iter().map(|i| i.bone_index as u32).collect();
        let weights: Vec<f32> = built.influences.iter().map(|i| i.weight).collect();
        assert_eq!(read.bone_indices, indices);
        assert_eq!(read.weights, weights);
        assert!(Vec2::from_array(read.uv).abs_diff_eq(built.uv, 1e-6));
    }

    let clip = &parsed.clips[0];
    assert_eq!(clip.name, "Swing");
    assert!((clip.duration - 0.1).abs() < 1e-6);
    for track in &clip.tracks {
        assert_eq!(track.times.len(), 4);
        assert_eq!(track.times[0], 0.0);
        assert!((track.times[3] - 0.1).abs() < 1e-6);
    }

    let built = &asset.clips[0];
    for (read, sampled) in clip.tracks.iter().zip(&built.tracks) {
        assert_eq!(read.name, sampled.name);
        for (i, sample) in sampled.samples.iter().enumerate() {
            assert_matrix_close(read.matrix(i).unwrap(), sample.local_matrix);
        }
    }
}

#[test]
fn test_exported_file_reads_back() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("body.anim");
    let mut scene = scene(2);

    let summary = ExportPipeline::new(ExportOptions::for_mesh("Body"))
        .export(&mut scene, &output)
        .unwrap();
    let parsed = AnimParser::new().parse_file(&output).unwrap();

    let read = parsed.summary();
    assert_eq!(read.nodes, summary.bones);
    assert_eq!(read.vertices, summary.vertices);
    assert_eq!(read.triangles, summary.triangles);
    assert_eq!(read.samples, summary.samples);
}

#[test]
fn test_all_armatures_tracks_are_qualified() {
    let mut scene = scene(2);
    scene.add_armature("Prop", vec![Bone::new("bone_0", Mat4::IDENTITY)]);

    let options = ExportOptions {
        sampling_mode: SamplingMode::AllArmatures,
        ..ExportOptions::for_mesh("Body")
    };
    let asset = ExportPipeline::new(options).run(&mut scene).unwrap();
    let text = AssetSerializer::new().to_string(&asset).unwrap();
    let parsed = AnimParser::new().parse_str(&text).unwrap();

    let names: Vec<&str> = parsed.clips[0].tracks.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(names, vec!["Rig/bone_0", "Rig/bone_1", "Prop/bone_0"]);
}

proptest! {
    #[test]
    fn prop_skeleton_and_influences_survive(
        bones in 1usize..12,
        offsets in proptest::collection::vec(-50.0f32..50.0, 12),
    ) {
        let skeleton_bones: Vec<Bone> = limb(bones)
            .into_iter()
            .enumerate()
            .map(|(i, mut bone)| {
                bone.rest_matrix = Mat4::from_translation(Vec3::splat(offsets[i])) * bone.rest_matrix;
                bone
            })
            .collect();
        let skeleton = SkeletonBuilder::build("Rig", &skeleton_bones).unwrap();
        let groups: VertexGroups = (0..bones as u32).map(|i| (i, format!("bone_{i}"))).collect();
        let mesh = MeshSkinner::new(&skeleton).skin(pentagon(bones as u32), &groups).unwrap();
        let asset = ExportedAsset::new(skeleton, mesh, Vec::new());

        let text = AssetSerializer::new().to_string(&asset).unwrap();
        let parsed = AnimParser::new().parse_str(&text).unwrap();

        prop_assert_eq!(parsed.nodes.len(), bones);
        for (read, built) in parsed.nodes.iter().zip(asset.skeleton.nodes()) {
            prop_assert_eq!(&read.name, &built.name);
            prop_assert_eq!(read.parent, built.parent_index());
            prop_assert!(read.inverse_bind_matrix().abs_diff_eq(built.inverse_bind, 1e-5));
        }
        prop_assert_eq!(parsed.vertices.len(), asset.mesh.vertices.len());
        for (read, built) in parsed.vertices.iter().zip(&asset.mesh.vertices) {
            let indices: Vec<u32> = built.influences.iter().map(|i| i.bone_index as u32).collect();
            prop_assert_eq!(&read.bone_indices, &indices);
        }
    }
}
