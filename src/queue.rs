use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use crate::{CommandContext, DeviceContext, FenceTracker, GfxResult, QueueType};

/// A submission queue with one monotonically increasing fence counter.
/// Every submit signals the current fence value; anything tagged with a
/// value at or below the last observed completion is safe to reclaim.
#[derive(Debug)]
pub struct CommandQueue {
    device_context: DeviceContext,
    queue_type: QueueType,
    /// Value the next submit will signal
    current_fence_value: AtomicU64,
    last_signaled_fence_value: AtomicU64,
    recycled_contexts: Mutex<VecDeque<(u64, CommandContext)>>,
}

impl CommandQueue {
    pub(crate) fn new(device_context: &DeviceContext, queue_type: QueueType) -> Self {
        Self {
            device_context: device_context.clone(),
            queue_type,
            current_fence_value: AtomicU64::new(1),
            last_signaled_fence_value: AtomicU64::new(0),
            recycled_contexts: Mutex::new(VecDeque::new()),
        }
    }

    pub fn queue_type(&self) -> QueueType {
        self.queue_type
    }

    pub fn device_context(&self) -> &DeviceContext {
        &self.device_context
    }

    /// The fence value the next submit will signal.
    pub fn current_fence_value(&self) -> u64 {
        self.current_fence_value.load(Ordering::SeqCst)
    }

    pub fn last_signaled_fence_value(&self) -> u64 {
        self.last_signaled_fence_value.load(Ordering::SeqCst)
    }

    /// Hands out a command context, recycling the oldest one whose
    /// submission fence has completed.
    pub fn allocate_context(&self) -> CommandContext {
        let mut recycled = self.recycled_contexts.lock().unwrap();
        if let Some((fence_value, _)) = recycled.front() {
            if self.is_fence_complete(*fence_value) {
                if let Some((_, mut context)) = recycled.pop_front() {
                    context.reset();
                    return context;
                }
            }
        }
        CommandContext::new()
    }

    /// Returns an unsubmitted context to the pool.
    pub fn discard_context(&self, mut context: CommandContext) {
        context.reset();
        self.recycled_contexts
            .lock()
            .unwrap()
            .push_front((0, context));
    }

    /// Executes the contexts and signals the queue fence behind them.
    /// Returns the signaled fence value.
    pub fn submit(&self, contexts: Vec<CommandContext>) -> GfxResult<u64> {
        if contexts.iter().any(|context| !context.is_ended()) {
            return Err("submitting a command context that was not ended".into());
        }
        let fence_value = self.current_fence_value.fetch_add(1, Ordering::SeqCst);
        let backend = self.device_context.backend();
        let mut recycled = self.recycled_contexts.lock().unwrap();
        for context in contexts {
            backend.execute(&context.ops)?;
            recycled.push_back((fence_value, context));
        }
        backend.signal_fence(fence_value);
        self.last_signaled_fence_value
            .fetch_max(fence_value, Ordering::SeqCst);
        log::trace!("submitted fence {}", fence_value);
        Ok(fence_value)
    }

    /// Blocks until everything ever submitted on this queue has completed.
    /// The teardown path: callers drain caches after this.
    pub fn wait_idle(&self) -> GfxResult<()> {
        let last = self.last_signaled_fence_value();
        if last > 0 {
            self.wait_for_fence(last)?;
        }
        Ok(())
    }
}

impl FenceTracker for CommandQueue {
    fn is_fence_complete(&self, fence_value: u64) -> bool {
        fence_value <= self.last_signaled_fence_value()
            && self.device_context.backend().is_fence_complete(fence_value)
    }

    fn wait_for_fence(&self, fence_value: u64) -> GfxResult<()> {
        if fence_value > self.last_signaled_fence_value() {
            return Err("waiting for a fence value that was never signaled".into());
        }
        self.device_context.backend().wait_for_fence(fence_value)
    }
}

#[cfg(test)]
mod tests {
    use crate::{DeviceContext, FenceTracker, QueueType};

    #[test]
    fn fence_values_are_monotonic_and_never_reused() {
        let device = DeviceContext::new_null().unwrap();
        let queue = device.create_queue(QueueType::Graphics);

        let mut previous = 0;
        for _ in 0..4 {
            let mut context = queue.allocate_context();
            context.begin().unwrap();
            context.end().unwrap();
            let fence_value = queue.submit(vec![context]).unwrap();
            assert!(fence_value > previous);
            assert!(queue.is_fence_complete(fence_value));
            previous = fence_value;
        }
        assert_eq!(queue.current_fence_value(), previous + 1);
    }

    #[test]
    fn unsubmitted_fence_is_incomplete() {
        let device = DeviceContext::new_null().unwrap();
        let queue = device.create_queue(QueueType::Graphics);
        assert!(!queue.is_fence_complete(1));
        assert!(queue.wait_for_fence(1).is_err());
    }

    #[test]
    fn double_begin_is_an_error() {
        let device = DeviceContext::new_null().unwrap();
        let queue = device.create_queue(QueueType::Graphics);
        let mut context = queue.allocate_context();
        context.begin().unwrap();
        assert!(context.begin().is_err());
    }

    #[test]
    fn submitting_an_open_context_is_an_error() {
        let device = DeviceContext::new_null().unwrap();
        let queue = device.create_queue(QueueType::Graphics);
        let mut context = queue.allocate_context();
        context.begin().unwrap();
        assert!(queue.submit(vec![context]).is_err());
    }
}
