//! Clip resampling into parent-relative bone tracks
//!
//! Every clip is stepped frame by frame over its closed frame range.
//! Sample times are clip-local: the first authored frame is time zero
//! whenever the clip starts after frame 0. No interpolation happens
//! here; the runtime interpolates between samples.
//!
//! The pose cursor is shared scene state. [`AnimationSampler::sample_all`]
//! puts the active action and frame back when it is done.

use std::collections::HashMap;

use glam::Mat4;
use rigbake_core::{safe_inverse, Error, Result, ResultExt};
use rigbake_scene::{Action, Armature, PoseQuery, Scene};
use serde::{Deserialize, Serialize};

use crate::skeleton::Skeleton;

/// Which armatures get sampled
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SamplingMode {
    /// Exactly one armature must be present; tracks are named by bone
    #[default]
    SingleArmature,
    /// Every armature is sampled; tracks are named `armature/bone`
    AllArmatures,
}

/// One sample of a bone track
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    /// Clip-local time in seconds
    pub time: f32,
    /// Transform relative to the parent bone's pose (armature-space for roots)
    pub local_matrix: Mat4,
}

/// Samples of one bone across a clip
#[derive(Debug, Clone, PartialEq)]
pub struct AnimationTrack {
    /// Name written to the asset
    pub name: String,
    pub armature: String,
    pub bone: String,
    pub samples: Vec<Sample>,
}

impl AnimationTrack {
    /// Sample timestamps
    pub fn times(&self) -> impl Iterator<Item = f32> + '_ {
        self.samples.iter().map(|s| s.time)
    }
}

/// A resampled action
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnimationClip {
    pub name: String,
    /// Seconds from the first to the last sampled frame
    pub duration: f32,
    /// Tracks in first-sampled order
    pub tracks: Vec<AnimationTrack>,
}

impl AnimationClip {
    /// Find a track by its written name
    pub fn track(&self, name: &str) -> Option<&AnimationTrack> {
        self.tracks.iter().find(|t| t.name == name)
    }

    /// Total samples over all tracks
    pub fn sample_count(&self) -> usize {
        self.tracks.iter().map(|t| t.samples.len()).sum()
    }
}

/// Integer frame range of an action and its clip-local time base
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameWindow {
    pub start: i32,
    pub end: i32,
    /// Seconds per frame
    pub frame_len: f64,
    /// Subtracted from absolute frame times so the clip starts at zero
    pub time_offset: f64,
}

impl FrameWindow {
    /// `start` is floored, `end` rounded half up
    pub fn new(frame_range: (f32, f32), fps: f32) -> Result<Self> {
        if !fps.is_finite() || fps <= 0.0 {
            return Err(Error::InvalidFrameRate { fps });
        }

        let start = frame_number(f64::from(frame_range.0).floor())?;
        let end = frame_number((f64::from(frame_range.1) + 0.5).floor())?;
        let frame_len = 1.0 / f64::from(fps);
        let time_offset = if start > 0 {
            f64::from(start) * frame_len
        } else {
            0.0
        };

        Ok(Self {
            start,
            end,
            frame_len,
            time_offset,
        })
    }

    /// Frames to sample, inclusive on both ends
    pub fn frames(&self) -> std::ops::RangeInclusive<i32> {
        self.start..=self.end
    }

    /// Number of samples each track receives
    pub fn sample_count(&self) -> usize {
        let count = i64::from(self.end) - i64::from(self.start) + 1;
        usize::try_from(count).unwrap_or(0)
    }

    /// Clip-local time of `frame`
    pub fn sample_time(&self, frame: i32) -> f32 {
        (f64::from(frame) * self.frame_len - self.time_offset) as f32
    }

    /// Clip duration in seconds
    pub fn duration(&self) -> f32 {
        (f64::from(self.end) * self.frame_len - self.time_offset) as f32
    }
}

fn frame_number(frame: f64) -> Result<i32> {
    if frame.is_finite() && frame >= f64::from(i32::MIN) && frame <= f64::from(i32::MAX) {
        Ok(frame as i32)
    } else {
        Err(Error::invalid_data(format!("frame {frame} is outside the supported range")))
    }
}

/// Resamples every scene action
#[derive(Debug, Clone, Default)]
pub struct AnimationSampler {
    mode: SamplingMode,
}

impl AnimationSampler {
    pub fn new(mode: SamplingMode) -> Self {
        Self { mode }
    }

    /// Sample all actions in scene order.
    ///
    /// The previously active action and frame are restored afterwards,
    /// also when sampling fails.
    pub fn sample_all<S>(&self, scene: &mut S, skeleton: &Skeleton) -> Result<Vec<AnimationClip>>
    where
        S: Scene + PoseQuery,
    {
        let actions = scene.actions();
        if actions.is_empty() {
            tracing::info!("Scene has no actions, no clips sampled");
            return Ok(Vec::new());
        }

        let armatures = self.select_armatures(scene, skeleton)?;
        let fps = scene.fps();

        let saved_action = scene.active_action();
        let saved_frame = scene.current_frame();

        let result = actions
            .iter()
            .map(|action| self.sample_clip(scene, action, &armatures, fps))
            .collect::<Result<Vec<_>>>();

        let restored = scene
            .set_action(saved_action.as_deref())
            .and_then(|()| scene.set_frame(saved_frame));

        let clips = result?;
        restored.context("restoring pose cursor")?;

        tracing::info!(
            clips = clips.len(),
            samples = clips.iter().map(AnimationClip::sample_count).sum::<usize>(),
            "Animations sampled"
        );
        Ok(clips)
    }

    fn select_armatures<S: Scene>(&self, scene: &S, skeleton: &Skeleton) -> Result<Vec<Armature>> {
        let armatures = scene.armatures();
        match self.mode {
            SamplingMode::SingleArmature => match armatures.len() {
                0 => Err(Error::NoArmature),
                1 if armatures[0].name == skeleton.armature() => Ok(armatures),
                1 => Err(Error::ArmatureNotFound {
                    name: skeleton.armature().to_string(),
                }),
                count => Err(Error::MultipleArmatures { count }),
            },
            SamplingMode::AllArmatures if armatures.is_empty() => Err(Error::NoArmature),
            SamplingMode::AllArmatures => Ok(armatures),
        }
    }

    /// Sample one action over the given armatures
    pub fn sample_clip<S>(
        &self,
        scene: &mut S,
        action: &Action,
        armatures: &[Armature],
        fps: f32,
    ) -> Result<AnimationClip>
    where
        S: PoseQuery,
    {
        let window = FrameWindow::new(action.frame_range, fps)?;
        let span = tracing::debug_span!("clip", action = %action.name);
        let _guard = span.enter();

        if window.sample_count() == 0 {
            tracing::warn!(
                start = window.start,
                end = window.end,
                "Empty frame range, clip has no tracks"
            );
        }

        scene
            .set_action(Some(&action.name))
            .with_context(|| format!("activating action '{}'", action.name))?;

        let mut tracks: Vec<AnimationTrack> = Vec::new();
        let mut lookup: HashMap<(String, String), usize> = HashMap::new();

        for frame in window.frames() {
            scene.set_frame(frame)?;
            let time = window.sample_time(frame);

            for armature in armatures {
                let locals = local_poses(scene, armature, frame)
                    .with_context(|| format!("sampling '{}' at frame {}", action.name, frame))?;

                for (bone, local_matrix) in armature.bones.iter().zip(locals) {
                    let key = (armature.name.clone(), bone.name.clone());
                    let slot = *lookup.entry(key).or_insert_with(|| {
                        tracks.push(AnimationTrack {
                            name: self.track_name(&armature.name, &bone.name),
                            armature: armature.name.clone(),
                            bone: bone.name.clone(),
                            samples: Vec::with_capacity(window.sample_count().min(1 << 16)),
                        });
                        tracks.len() - 1
                    });
                    tracks[slot].samples.push(Sample { time, local_matrix });
                }
            }
        }

        tracing::debug!(tracks = tracks.len(), samples = window.sample_count(), "Clip sampled");

        Ok(AnimationClip {
            name: action.name.clone(),
            duration: window.duration(),
            tracks,
        })
    }

    fn track_name(&self, armature: &str, bone: &str) -> String {
        match self.mode {
            SamplingMode::SingleArmature => bone.to_string(),
            SamplingMode::AllArmatures => format!("{armature}/{bone}"),
        }
    }
}

/// Parent-relative matrices for every bone of `armature` at the current frame
fn local_poses<S: PoseQuery>(scene: &S, armature: &Armature, frame: i32) -> Result<Vec<Mat4>> {
    let poses = armature
        .bones
        .iter()
        .map(|bone| scene.query_pose(&armature.name, &bone.name))
        .collect::<Result<Vec<_>>>()?;

    let index: HashMap<&str, usize> = armature
        .bones
        .iter()
        .enumerate()
        .map(|(i, b)| (b.name.as_str(), i))
        .collect();

    armature
        .bones
        .iter()
        .zip(&poses)
        .map(|(bone, pose)| {
            let Some(parent) = &bone.parent else {
                return Ok(*pose);
            };
            let parent_pose = match index.get(parent.as_str()) {
                Some(&i) => poses[i],
                None => scene.query_pose(&armature.name, parent)?,
            };
            let inverse = safe_inverse(&parent_pose);
            if inverse.is_degenerate() {
                tracing::warn!(
                    armature = %armature.name,
                    bone = %bone.name,
                    parent = %parent,
                    frame,
                    "Singular parent pose, local transform is a best-effort substitute"
                );
            }
            Ok(inverse.matrix() * *pose)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::skeleton::SkeletonBuilder;
    use glam::{Quat, Vec3};
    use rigbake_scene::{Bone, MemoryScene};

    fn root_pose(frame: i32) -> Mat4 {
        Mat4::from_rotation_translation(
            Quat::from_rotation_z(frame as f32 * 0.1),
            Vec3::new(frame as f32, 0.0, 0.0),
        )
    }

    fn child_pose(frame: i32) -> Mat4 {
        root_pose(frame) * Mat4::from_rotation_translation(Quat::from_rotation_x(0.2), Vec3::Y)
    }

    fn scene() -> (MemoryScene, Skeleton) {
        let bones = vec![
            Bone::new("root", Mat4::IDENTITY),
            Bone::new("child", Mat4::from_translation(Vec3::Y)).with_parent("root"),
        ];
        let skeleton = SkeletonBuilder::build("Armature", &bones).unwrap();

        let mut scene = MemoryScene::new(30.0);
        scene.add_armature("Armature", bones);
        scene.add_action(Action::new("Punch", 10.0, 13.0));
        for frame in 10..=13 {
            scene.add_pose_key("Punch", "Armature", "root", frame, root_pose(frame)).unwrap();
            scene.add_pose_key("Punch", "Armature", "child", frame, child_pose(frame)).unwrap();
        }
        (scene, skeleton)
    }

    #[test]
    fn test_frame_window_offsets_late_clips() {
        let window = FrameWindow::new((10.0, 13.0), 30.0).unwrap();
        assert_eq!(window.sample_count(), 4);
        assert_eq!(window.sample_time(10), 0.0);
        assert!((window.sample_time(13) - 0.1).abs() < 1e-6);
        assert!((window.duration() - 0.1).abs() < 1e-6);
    }

    #[test]
    fn test_frame_window_rounding() {
        let window = FrameWindow::new((1.7, 4.5), 24.0).unwrap();
        assert_eq!(window.start, 1);
        assert_eq!(window.end, 5);

        let window = FrameWindow::new((0.0, 4.4), 24.0).unwrap();
        assert_eq!(window.end, 4);
    }

    #[test]
    fn test_frame_window_no_offset_from_zero_or_negative_start() {
        let window = FrameWindow::new((-2.0, 2.0), 10.0).unwrap();
        assert_eq!(window.time_offset, 0.0);
        assert!((window.sample_time(-2) + 0.2).abs() < 1e-6);
        assert_eq!(window.sample_count(), 5);
    }

    #[test]
    fn test_frame_window_spanning_i32_counts_every_frame() {
        let window = FrameWindow::new((-2.0e9, 2.0e9), 30.0).unwrap();
        assert_eq!(window.sample_count(), 4_000_000_001);
    }

    #[test]
    fn test_frame_window_outside_i32_rejected() {
        let err = FrameWindow::new((0.0, 1.0e10), 30.0).unwrap_err();
        assert!(matches!(err, Error::InvalidData { .. }));
        assert!(FrameWindow::new((f32::NEG_INFINITY, 1.0), 30.0).is_err());
    }

    #[test]
    fn test_invalid_fps_rejected() {
        assert!(FrameWindow::new((0.0, 1.0), 0.0).is_err());
        assert!(FrameWindow::new((0.0, 1.0), f32::NAN).is_err());
    }

    #[test]
    fn test_two_bone_clip_is_offset_normalized() {
        let (mut scene, skeleton) = scene();
        let clips = AnimationSampler::default().sample_all(&mut scene, &skeleton).unwrap();

        assert_eq!(clips.len(), 1);
        let clip = &clips[0];
        assert_eq!(clip.name, "Punch");
        assert!((clip.duration - 3.0 / 30.0).abs() < 1e-6);
        assert_eq!(clip.tracks.len(), 2);

        let expected = [0.0, 1.0 / 30.0, 2.0 / 30.0, 3.0 / 30.0];
        for track in &clip.tracks {
            assert_eq!(track.samples.len(), 4);
            for (time, want) in track.times().zip(expected) {
                assert!((time - want).abs() < 1e-6, "{} at {}", track.name, time);
            }
        }

        let root = clip.track("root").unwrap();
        let child = clip.track("child").unwrap();
        assert_eq!(root.times().collect::<Vec<_>>(), child.times().collect::<Vec<_>>());
    }

    #[test]
    fn test_root_is_world_and_child_is_parent_relative() {
        let (mut scene, skeleton) = scene();
        let clips = AnimationSampler::default().sample_all(&mut scene, &skeleton).unwrap();
        let clip = &clips[0];

        for (i, frame) in (10..=13).enumerate() {
            let root = clip.track("root").unwrap().samples[i].local_matrix;
            assert_eq!(root, root_pose(frame));

            let child = clip.track("child").unwrap().samples[i].local_matrix;
            let expected = root_pose(frame).inverse() * child_pose(frame);
            assert!(child.abs_diff_eq(expected, 1e-5));
        }
    }

    #[test]
    fn test_singular_parent_pose_still_samples() {
        let (mut scene, skeleton) = scene();
        scene.add_action(Action::new("Collapse", 0.0, 1.0));
        for frame in 0..=1 {
            scene.add_pose_key("Collapse", "Armature", "root", frame, Mat4::ZERO).unwrap();
            scene.add_pose_key("Collapse", "Armature", "child", frame, child_pose(frame)).unwrap();
        }

        let clips = AnimationSampler::default().sample_all(&mut scene, &skeleton).unwrap();
        let clip = clips.iter().find(|c| c.name == "Collapse").unwrap();

        for track in &clip.tracks {
            assert_eq!(track.samples.len(), 2);
            assert!(track.samples.iter().all(|s| s.local_matrix.is_finite()), "{}", track.name);
        }
        // Identity stands in for the singular parent inverse
        let child = clip.track("child").unwrap();
        assert_eq!(child.samples[1].local_matrix, child_pose(1));
    }

    #[test]
    fn test_cursor_is_restored() {
        let (mut scene, skeleton) = scene();
        scene.set_frame(42).unwrap();
        AnimationSampler::default().sample_all(&mut scene, &skeleton).unwrap();
        assert_eq!(scene.current_frame(), 42);
        assert_eq!(scene.active_action(), None);
    }

    #[test]
    fn test_single_mode_rejects_second_armature() {
        let (mut scene, skeleton) = scene();
        scene.add_armature("Prop", vec![Bone::new("root", Mat4::IDENTITY)]);

        let err = AnimationSampler::new(SamplingMode::SingleArmature)
            .sample_all(&mut scene, &skeleton)
            .unwrap_err();
        assert!(matches!(err, Error::MultipleArmatures { count: 2 }));
    }

    #[test]
    fn test_all_armatures_mode_keeps_same_named_bones_apart() {
        let (mut scene, skeleton) = scene();
        scene.add_armature("Prop", vec![Bone::new("root", Mat4::from_translation(Vec3::Z))]);

        let clips = AnimationSampler::new(SamplingMode::AllArmatures)
            .sample_all(&mut scene, &skeleton)
            .unwrap();
        let clip = &clips[0];

        assert_eq!(clip.tracks.len(), 3);
        let names: Vec<_> = clip.tracks.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["Armature/root", "Armature/child", "Prop/root"]);
        assert_eq!(clip.track("Prop/root").unwrap().samples.len(), 4);
        assert_eq!(
            clip.track("Prop/root").unwrap().samples[0].local_matrix,
            Mat4::from_translation(Vec3::Z)
        );
    }

    #[test]
    fn test_empty_range_gives_trackless_clip() {
        let (mut scene, skeleton) = scene();
        scene.add_action(Action::new("Broken", 5.0, 2.0));
        let clips = AnimationSampler::default().sample_all(&mut scene, &skeleton).unwrap();
        let broken = clips.iter().find(|c| c.name == "Broken").unwrap();
        assert!(broken.tracks.is_empty());
    }

    #[test]
    fn test_no_actions_needs_no_armature() {
        let bones = vec![Bone::new("root", Mat4::IDENTITY)];
        let skeleton = SkeletonBuilder::build("Armature", &bones).unwrap();
        let mut scene = MemoryScene::new(24.0);
        let clips = AnimationSampler::default().sample_all(&mut scene, &skeleton).unwrap();
        assert!(clips.is_empty());
    }
}
