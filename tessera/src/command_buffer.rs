// Copyright 2024 the Tessera Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use crate::draw_pass::DrawPass;
use crate::resource::{GraphicsPipeline, ResourceId, Sampler, Texture};
use crate::{Error, Result};

/// A shared resource retained by a command buffer.
#[derive(Clone, Debug)]
pub enum TrackedResource {
    Pipeline(Arc<GraphicsPipeline>),
    Texture(Arc<Texture>),
    Sampler(Arc<Sampler>),
}

impl TrackedResource {
    pub fn id(&self) -> ResourceId {
        match self {
            Self::Pipeline(p) => p.id(),
            Self::Texture(t) => t.id(),
            Self::Sampler(s) => s.id(),
        }
    }
}

/// Backend-agnostic record of the work submitted together.
///
/// The command buffer holds a strong reference to every resource its passes use, so caches
/// can drop their own references without freeing objects the GPU may still read.
#[derive(Default)]
pub struct CommandBuffer {
    tracked: Vec<TrackedResource>,
    tracked_ids: HashSet<ResourceId>,
    draw_pass_count: usize,
}

impl CommandBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Retains `resource` until the command buffer is dropped. Each resource is held once.
    pub fn track_resource(&mut self, resource: TrackedResource) {
        if self.tracked_ids.insert(resource.id()) {
            self.tracked.push(resource);
        }
    }

    /// Adds a prepared draw pass, retaining its resources.
    pub fn add_draw_pass(&mut self, pass: &DrawPass) -> Result<()> {
        if !pass.is_prepared() {
            return Err(Error::Unprepared);
        }
        pass.add_resource_refs(self);
        if let Some(target) = pass.target().texture() {
            self.track_resource(TrackedResource::Texture(target.clone()));
        }
        self.draw_pass_count += 1;
        Ok(())
    }

    pub fn tracked_resources(&self) -> &[TrackedResource] {
        &self.tracked
    }

    pub fn draw_pass_count(&self) -> usize {
        self.draw_pass_count
    }
}

/// Identifies a submission. Fences are signaled in submission order.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FenceId(pub u64);

/// Command buffers that were submitted and whose GPU work has not completed yet.
#[derive(Default)]
pub struct SubmissionQueue {
    next_fence: u64,
    in_flight: VecDeque<(FenceId, CommandBuffer)>,
}

impl SubmissionQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn submit(&mut self, command_buffer: CommandBuffer) -> FenceId {
        let fence = FenceId(self.next_fence);
        self.next_fence += 1;
        log::trace!(
            "Submitted {fence:?} retaining {} resources",
            command_buffer.tracked.len()
        );
        self.in_flight.push_back((fence, command_buffer));
        fence
    }

    /// Marks every submission up to and including `fence` as complete, releasing the
    /// resources they retained. Returns the number of released submissions.
    pub fn signal(&mut self, fence: FenceId) -> usize {
        let mut released = 0;
        while self.in_flight.front().is_some_and(|(f, _)| *f <= fence) {
            self.in_flight.pop_front();
            released += 1;
        }
        released
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// Whether an outstanding submission still references the resource.
    pub fn is_retained(&self, id: ResourceId) -> bool {
        self.in_flight
            .iter()
            .any(|(_, cb)| cb.tracked.iter().any(|r| r.id() == id))
    }
}
