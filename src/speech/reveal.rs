//! Progressive text reveal paced against an estimated speech duration
//!
//! The animation is a pure step function. [`TextRevealAnimator`] turns elapsed
//! wall time from any scheduler into ticks, so production code can drive it from
//! a timer loop while tests drive it synchronously.

use super::estimator::SpeechEstimate;

/// Identifies one started animation; frames carry it so stale ones can be told apart
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RevealHandle(u64);

/// State of the reveal after a tick
#[derive(Debug, Clone, PartialEq)]
pub struct RevealFrame {
    pub handle: RevealHandle,
    pub step: u64,
    pub progress: f32,
    pub revealed_text: String,
    /// Set on exactly one frame per animation, the one where progress reaches 1
    pub complete: bool,
}

/// A single reveal animation
#[derive(Debug, Clone)]
pub struct RevealAnimation {
    handle: RevealHandle,
    text: String,
    char_count: u64,
    estimate: SpeechEstimate,
    step: u64,
    complete: bool,
}

impl RevealAnimation {
    pub fn new(handle: RevealHandle, text: impl Into<String>, estimate: SpeechEstimate) -> Self {
        let text = text.into();
        let char_count = text.chars().count() as u64;
        Self {
            handle,
            text,
            char_count,
            estimate,
            step: 0,
            complete: false,
        }
    }

    /// Advance one tick. Returns `None` once the animation has completed.
    pub fn step(&mut self) -> Option<RevealFrame> {
        if self.complete {
            return None;
        }
        self.step += 1;
        if self.step >= self.estimate.total_steps() {
            self.complete = true;
        }
        Some(self.frame())
    }

    /// Jump straight to the fully revealed state
    pub fn finish(&mut self) -> Option<RevealFrame> {
        if self.complete {
            return None;
        }
        self.step = self.step.max(self.estimate.total_steps());
        self.complete = true;
        Some(self.frame())
    }

    pub fn progress(&self) -> f32 {
        if self.complete || self.estimate.duration_ms == 0 {
            return 1.0;
        }
        let elapsed = self.step * self.estimate.step_ms;
        (elapsed as f32 / self.estimate.duration_ms as f32).min(1.0)
    }

    /// Prefix of the text holding `ceil(chars * progress)` characters
    pub fn revealed_text(&self) -> String {
        let shown = if self.complete || self.estimate.duration_ms == 0 {
            self.char_count
        } else {
            let elapsed = (self.step * self.estimate.step_ms) as u128;
            let duration = self.estimate.duration_ms as u128;
            let chars = self.char_count as u128;
            ((chars * elapsed).div_ceil(duration) as u64).min(self.char_count)
        };
        self.text.chars().take(shown as usize).collect()
    }

    pub fn is_complete(&self) -> bool {
        self.complete
    }

    pub fn handle(&self) -> RevealHandle {
        self.handle
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    fn frame(&self) -> RevealFrame {
        RevealFrame {
            handle: self.handle,
            step: self.step,
            progress: self.progress(),
            revealed_text: self.revealed_text(),
            complete: self.complete,
        }
    }
}

/// Owns at most one running [`RevealAnimation`] and feeds it elapsed time
#[derive(Debug, Default)]
pub struct TextRevealAnimator {
    active: Option<RevealAnimation>,
    carry_ms: u64,
    next_handle: u64,
}

impl TextRevealAnimator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start revealing `text`, cancelling any animation already running
    pub fn start(&mut self, text: &str, estimate: SpeechEstimate) -> RevealHandle {
        self.cancel();
        self.next_handle += 1;
        let handle = RevealHandle(self.next_handle);
        self.active = Some(RevealAnimation::new(handle, text, estimate));
        handle
    }

    /// Feed elapsed time and collect the frames for every tick crossed
    ///
    /// After the completing frame the animation is dropped, so later calls yield nothing.
    pub fn advance(&mut self, elapsed_ms: u64) -> Vec<RevealFrame> {
        let mut frames = Vec::new();
        let Some(animation) = self.active.as_mut() else {
            return frames;
        };

        let step_ms = animation.estimate.step_ms.max(1);
        self.carry_ms += elapsed_ms;
        while self.carry_ms >= step_ms {
            self.carry_ms -= step_ms;
            match animation.step() {
                Some(frame) => frames.push(frame),
                None => break,
            }
            if animation.is_complete() {
                break;
            }
        }

        if animation.is_complete() {
            self.active = None;
            self.carry_ms = 0;
        }
        frames
    }

    /// Force completion of the running animation
    pub fn complete_now(&mut self) -> Option<RevealFrame> {
        let frame = self.active.as_mut().and_then(RevealAnimation::finish);
        self.active = None;
        self.carry_ms = 0;
        frame
    }

    /// Stop without emitting anything. Safe to call repeatedly.
    pub fn cancel(&mut self) -> bool {
        self.carry_ms = 0;
        self.active.take().is_some()
    }

    pub fn is_running(&self) -> bool {
        self.active.is_some()
    }

    pub fn current(&self) -> Option<&RevealAnimation> {
        self.active.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::speech::estimator::estimate;

    fn run_to_end(animator: &mut TextRevealAnimator) -> Vec<RevealFrame> {
        let mut frames = Vec::new();
        for _ in 0..10_000 {
            frames.extend(animator.advance(50));
            if !animator.is_running() {
                break;
            }
        }
        frames
    }

    #[test]
    fn test_progress_is_monotonic_and_completes_once() {
        let text = "Entendi sua mensagem. Posso ajudar com seu plano alimentar.";
        let mut animator = TextRevealAnimator::new();
        animator.start(text, estimate(text));

        let frames = run_to_end(&mut animator);
        assert!(!frames.is_empty());
        for pair in frames.windows(2) {
            assert!(pair[1].progress >= pair[0].progress);
            assert!(pair[1].revealed_text.len() >= pair[0].revealed_text.len());
        }

        let completions: Vec<_> = frames.iter().filter(|f| f.complete).collect();
        assert_eq!(completions.len(), 1);
        assert_eq!(frames.last().unwrap().progress, 1.0);
        assert_eq!(frames.last().unwrap().revealed_text, text);

        assert!(animator.advance(1000).is_empty());
    }

    #[test]
    fn test_prefixes_of_original_text() {
        let text = "Olá, Maria! Como posso te ajudar?";
        let mut animator = TextRevealAnimator::new();
        animator.start(text, estimate(text));

        for frame in run_to_end(&mut animator) {
            assert!(text.starts_with(&frame.revealed_text));
        }
    }

    #[test]
    fn test_tick_count_matches_estimate() {
        let text = "hi";
        let est = estimate(text);
        let mut animator = TextRevealAnimator::new();
        animator.start(text, est);

        let frames = run_to_end(&mut animator);
        assert_eq!(frames.len() as u64, est.total_steps());
        assert_eq!(frames.len(), 60);
    }

    #[test]
    fn test_partial_elapsed_carries_over() {
        let mut animator = TextRevealAnimator::new();
        animator.start("abc", estimate("abc"));

        assert!(animator.advance(30).is_empty());
        let frames = animator.advance(30);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].step, 1);
    }

    #[test]
    fn test_revealed_text_uses_ceil() {
        let mut animator = TextRevealAnimator::new();
        animator.start("abc", estimate("abc"));
        let frames = animator.advance(50);
        // 1/60 of 3 chars rounds up to 1
        assert_eq!(frames[0].revealed_text, "a");
    }

    #[test]
    fn test_cancel_is_idempotent_and_silent() {
        let mut animator = TextRevealAnimator::new();
        animator.start("abc", estimate("abc"));
        animator.advance(100);

        assert!(animator.cancel());
        assert!(!animator.cancel());
        assert!(animator.advance(10_000).is_empty());
        assert!(animator.complete_now().is_none());
    }

    #[test]
    fn test_restart_replaces_previous() {
        let mut animator = TextRevealAnimator::new();
        let first = animator.start("primeiro", estimate("primeiro"));
        animator.advance(500);
        let second = animator.start("segundo", estimate("segundo"));
        assert_ne!(first, second);

        let frames = animator.advance(50);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].handle, second);
        assert_eq!(frames[0].step, 1);
    }

    #[test]
    fn test_complete_now_jumps_to_full_text() {
        let text = "Beba bastante água";
        let mut animator = TextRevealAnimator::new();
        animator.start(text, estimate(text));
        animator.advance(200);

        let frame = animator.complete_now().unwrap();
        assert!(frame.complete);
        assert_eq!(frame.progress, 1.0);
        assert_eq!(frame.revealed_text, text);
        assert!(!animator.is_running());
    }

    #[test]
    fn test_large_elapsed_stops_at_completion() {
        let mut animator = TextRevealAnimator::new();
        animator.start("hi", estimate("hi"));
        let frames = animator.advance(60_000);
        assert_eq!(frames.len(), 60);
        assert!(frames.last().unwrap().complete);
    }

    #[test]
    fn test_zero_duration_completes_on_first_tick() {
        let mut animation = RevealAnimation::new(
            RevealHandle(1),
            "",
            SpeechEstimate {
                duration_ms: 0,
                step_ms: 50,
            },
        );
        let frame = animation.step().unwrap();
        assert!(frame.complete);
        assert_eq!(frame.progress, 1.0);
        assert!(animation.step().is_none());
    }
}
