//! Keeps the active word vertically centred while the engine owns scrolling.
//!
//! Corrections are proportional to how far the word has drifted: a tiered
//! multiplier closes large gaps quickly and eases small ones. Any scroll the
//! controller did not cause hands control back to the reader.

use log::{debug, info};

use crate::timer::TimerSlot;

/// `(exclusive lower bound in px, multiplier)`, checked from the top down.
const SPEED_TIERS: [(f32, f32); 4] = [(1_000.0, 2.0), (500.0, 1.5), (300.0, 1.0), (100.0, 0.5)];
const NEAR_MULTIPLIER: f32 = 0.1;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScrollConfig {
    /// Offsets at or below this are left alone.
    pub dead_zone_px: f32,
    /// Corrections shorter than this are eased; longer ones jump.
    pub smooth_threshold_px: f32,
    /// Scroll events this soon after a programmatic scroll are our own echo.
    pub programmatic_grace_ms: u64,
    /// Larger unexplained scroll deltas are treated as the reader's.
    pub manual_delta_px: f32,
    /// How long a re-enable recentre is shielded from manual-scroll detection.
    pub stability_window_ms: u64,
    pub evaluate_interval_ms: u64,
}

impl Default for ScrollConfig {
    fn default() -> Self {
        Self {
            dead_zone_px: 5.0,
            smooth_threshold_px: 100.0,
            programmatic_grace_ms: 100,
            manual_delta_px: 10.0,
            stability_window_ms: 5_000,
            evaluate_interval_ms: 200,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ScrollBehavior {
    Smooth,
    Instant,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScrollCorrection {
    pub delta: f32,
    pub behavior: ScrollBehavior,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ScrollAttribution {
    /// Caused by the controller itself.
    Programmatic,
    /// Too small to mean anything, or auto-scroll is already off.
    Negligible,
    /// The reader scrolled; auto-scroll has been disabled.
    User,
}

/// Observable scroll flags.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScrollState {
    pub auto_scroll_enabled: bool,
    pub last_known_scroll_offset: f32,
    pub last_programmatic_scroll_at: Option<u64>,
}

/// Rendering-layer geometry the controller reads and drives.
pub trait Viewport {
    fn scroll_top(&self) -> f32;

    fn height(&self) -> f32;

    /// Vertical centre of a rendered word relative to the viewport top, or
    /// `None` when the word is not currently rendered.
    fn word_center_y(&self, word_index: usize) -> Option<f32>;

    fn scroll_to(&mut self, top: f32, behavior: ScrollBehavior);
}

pub fn speed_multiplier(distance_px: f32) -> f32 {
    let distance = distance_px.abs();
    SPEED_TIERS
        .iter()
        .find(|(floor, _)| distance > *floor)
        .map_or(NEAR_MULTIPLIER, |(_, multiplier)| *multiplier)
}

/// Scroll adjustment for a word sitting `offset_px` below the viewport centre.
///
/// The smooth/instant choice looks at the tiered delta, not the raw offset.
pub fn correction_for(offset_px: f32, config: &ScrollConfig) -> Option<ScrollCorrection> {
    let distance = offset_px.abs();
    if distance.is_nan() || distance <= config.dead_zone_px {
        return None;
    }

    let delta = offset_px * speed_multiplier(offset_px);
    let behavior = if delta.abs() < config.smooth_threshold_px {
        ScrollBehavior::Smooth
    } else {
        ScrollBehavior::Instant
    };
    Some(ScrollCorrection { delta, behavior })
}

#[derive(Debug)]
pub struct AutoScrollController {
    config: ScrollConfig,
    enabled: bool,
    suspended: bool,
    last_known_offset: f32,
    last_programmatic_at: Option<u64>,
    stability_until: Option<u64>,
    evaluate: TimerSlot,
}

impl AutoScrollController {
    pub fn new(config: ScrollConfig, enabled: bool) -> Self {
        Self {
            config,
            enabled,
            suspended: false,
            last_known_offset: 0.0,
            last_programmatic_at: None,
            stability_until: None,
            evaluate: TimerSlot::new(),
        }
    }

    pub fn config(&self) -> &ScrollConfig {
        &self.config
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn is_suspended(&self) -> bool {
        self.suspended
    }

    pub fn state(&self) -> ScrollState {
        ScrollState {
            auto_scroll_enabled: self.enabled,
            last_known_scroll_offset: self.last_known_offset,
            last_programmatic_scroll_at: self.last_programmatic_at,
        }
    }

    /// Re-evaluates at most once per interval and applies a correction.
    pub fn evaluate<V: Viewport>(
        &mut self,
        now_ms: u64,
        viewport: &mut V,
        cursor: usize,
        is_playing: bool,
    ) -> Option<ScrollCorrection> {
        if !self.enabled || self.suspended || !is_playing {
            self.evaluate.cancel();
            return None;
        }
        if self.evaluate.is_armed() && !self.evaluate.fire(now_ms) {
            return None;
        }
        self.evaluate.arm(now_ms, self.config.evaluate_interval_ms);

        let offset = self.offset_of(viewport, cursor)?;
        let correction = correction_for(offset, &self.config)?;
        let target = (viewport.scroll_top() + correction.delta).max(0.0);
        self.scroll_programmatically(now_ms, viewport, target, correction.behavior);
        Some(correction)
    }

    /// Reader-initiated re-enable: centre the current word right away.
    pub fn enable<V: Viewport>(&mut self, now_ms: u64, viewport: &mut V, cursor: usize) {
        self.enabled = true;
        self.stability_until = Some(now_ms.saturating_add(self.config.stability_window_ms));
        self.evaluate.cancel();
        info!("scroll: auto-scroll enabled cursor={}", cursor);
        self.recenter(now_ms, viewport, cursor);
    }

    pub fn disable(&mut self) {
        if self.enabled {
            info!("scroll: auto-scroll disabled");
        }
        self.enabled = false;
        self.evaluate.cancel();
    }

    /// Jumps straight to the word's centred position, ignoring tiers.
    pub fn recenter<V: Viewport>(&mut self, now_ms: u64, viewport: &mut V, cursor: usize) -> bool {
        let Some(offset) = self.offset_of(viewport, cursor) else {
            return false;
        };
        let behavior = if offset.abs() < self.config.smooth_threshold_px {
            ScrollBehavior::Smooth
        } else {
            ScrollBehavior::Instant
        };
        let target = (viewport.scroll_top() + offset).max(0.0);
        self.scroll_programmatically(now_ms, viewport, target, behavior);
        true
    }

    pub fn reset_to_top<V: Viewport>(&mut self, now_ms: u64, viewport: &mut V) {
        self.scroll_programmatically(now_ms, viewport, 0.0, ScrollBehavior::Instant);
    }

    /// Holds corrections while a new window renders.
    pub fn suspend(&mut self) {
        self.suspended = true;
        self.evaluate.cancel();
    }

    pub fn resume(&mut self) {
        self.suspended = false;
    }

    /// Attributes a raw scroll event to the controller or to the reader.
    pub fn observe_scroll(&mut self, now_ms: u64, offset: f32) -> ScrollAttribution {
        let delta = (offset - self.last_known_offset).abs();
        self.last_known_offset = offset;

        if self.is_programmatic_window(now_ms) {
            return ScrollAttribution::Programmatic;
        }
        if !self.enabled || delta <= self.config.manual_delta_px {
            return ScrollAttribution::Negligible;
        }

        debug!(
            "scroll: manual scroll delta={} since_programmatic_ms={:?}",
            delta,
            self.last_programmatic_at
                .map(|at| now_ms.saturating_sub(at))
        );
        self.disable();
        ScrollAttribution::User
    }

    /// Wheel and touch input only ever come from the reader.
    pub fn observe_user_gesture(&mut self, now_ms: u64) -> ScrollAttribution {
        if self.is_programmatic_window(now_ms) || !self.enabled {
            return ScrollAttribution::Negligible;
        }
        self.disable();
        ScrollAttribution::User
    }

    /// Stops the interval evaluation, used when the reading view closes.
    pub fn cancel(&mut self) {
        self.evaluate.cancel();
        self.suspended = false;
    }

    fn is_programmatic_window(&self, now_ms: u64) -> bool {
        let in_grace = self
            .last_programmatic_at
            .is_some_and(|at| now_ms.saturating_sub(at) <= self.config.programmatic_grace_ms);
        let in_stability = self.stability_until.is_some_and(|until| now_ms < until);
        in_grace || in_stability
    }

    fn offset_of<V: Viewport>(&self, viewport: &V, cursor: usize) -> Option<f32> {
        let center = viewport.word_center_y(cursor)?;
        Some(center - viewport.height() / 2.0)
    }

    fn scroll_programmatically<V: Viewport>(
        &mut self,
        now_ms: u64,
        viewport: &mut V,
        target: f32,
        behavior: ScrollBehavior,
    ) {
        viewport.scroll_to(target, behavior);
        self.last_known_offset = target;
        self.last_programmatic_at = Some(now_ms);
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// One word per line, `line_height` pixels apart.
    pub(crate) struct LineViewport {
        pub top: f32,
        pub height: f32,
        pub line_height: f32,
        pub rendered: core::ops::Range<usize>,
        pub scrolls: usize,
        pub last_behavior: Option<ScrollBehavior>,
    }

    impl LineViewport {
        pub(crate) fn new(height: f32, line_height: f32) -> Self {
            Self {
                top: 0.0,
                height,
                line_height,
                rendered: 0..usize::MAX,
                scrolls: 0,
                last_behavior: None,
            }
        }
    }

    impl Viewport for LineViewport {
        fn scroll_top(&self) -> f32 {
            self.top
        }

        fn height(&self) -> f32 {
            self.height
        }

        fn word_center_y(&self, word_index: usize) -> Option<f32> {
            if !self.rendered.contains(&word_index) {
                return None;
            }
            let line = (word_index - self.rendered.start) as f32;
            Some(line * self.line_height + self.line_height / 2.0 - self.top)
        }

        fn scroll_to(&mut self, top: f32, behavior: ScrollBehavior) {
            self.top = top;
            self.scrolls += 1;
            self.last_behavior = Some(behavior);
        }
    }

    #[test]
    fn dead_zone_produces_no_correction() {
        let config = ScrollConfig::default();
        assert_eq!(correction_for(4.0, &config), None);
        assert_eq!(correction_for(-5.0, &config), None);
        assert!(correction_for(6.0, &config).is_some());
    }

    #[test]
    fn multiplier_tiers_follow_distance() {
        assert_eq!(speed_multiplier(1_200.0), 2.0);
        assert_eq!(speed_multiplier(-1_200.0), 2.0);
        assert_eq!(speed_multiplier(1_000.0), 1.5);
        assert_eq!(speed_multiplier(600.0), 1.5);
        assert_eq!(speed_multiplier(400.0), 1.0);
        assert_eq!(speed_multiplier(150.0), 0.5);
        assert_eq!(speed_multiplier(50.0), 0.1);
    }

    #[test]
    fn large_corrections_jump_and_small_ones_ease() {
        let config = ScrollConfig::default();
        let far = correction_for(1_200.0, &config).unwrap();
        assert_eq!(far.delta, 2_400.0);
        assert_eq!(far.behavior, ScrollBehavior::Instant);

        let near = correction_for(-50.0, &config).unwrap();
        assert_eq!(near.delta, -5.0);
        assert_eq!(near.behavior, ScrollBehavior::Smooth);
    }

    #[test]
    fn behavior_follows_the_tiered_delta() {
        let config = ScrollConfig::default();
        let eased = correction_for(150.0, &config).unwrap();
        assert_eq!(eased.delta, 75.0);
        assert_eq!(eased.behavior, ScrollBehavior::Smooth);

        let upward = correction_for(-180.0, &config).unwrap();
        assert_eq!(upward.delta, -90.0);
        assert_eq!(upward.behavior, ScrollBehavior::Smooth);

        let jump = correction_for(250.0, &config).unwrap();
        assert_eq!(jump.delta, 125.0);
        assert_eq!(jump.behavior, ScrollBehavior::Instant);
    }

    #[test]
    fn evaluation_scrolls_towards_word_and_clamps_at_zero() {
        let mut viewport = LineViewport::new(400.0, 20.0);
        let mut controller = AutoScrollController::new(ScrollConfig::default(), true);

        // Word 40 is centred at 810px, 610px below the viewport centre.
        let correction = controller.evaluate(0, &mut viewport, 40, true).unwrap();
        assert_eq!(correction.delta, 915.0);
        assert_eq!(viewport.top, 915.0);

        // Word 0 is far above; the scroll top cannot go negative.
        controller.evaluate(200, &mut viewport, 0, true).unwrap();
        assert_eq!(viewport.top, 0.0);
    }

    #[test]
    fn evaluation_is_rate_limited_and_needs_playback() {
        let mut viewport = LineViewport::new(400.0, 20.0);
        let mut controller = AutoScrollController::new(ScrollConfig::default(), true);

        assert!(controller.evaluate(0, &mut viewport, 0, false).is_none());
        assert!(controller.evaluate(0, &mut viewport, 60, true).is_some());
        assert!(controller.evaluate(100, &mut viewport, 90, true).is_none());
        assert!(controller.evaluate(200, &mut viewport, 90, true).is_some());
        assert_eq!(viewport.scrolls, 2);
    }

    #[test]
    fn unrendered_word_is_skipped() {
        let mut viewport = LineViewport::new(400.0, 20.0);
        viewport.rendered = 0..10;
        let mut controller = AutoScrollController::new(ScrollConfig::default(), true);
        assert!(controller.evaluate(0, &mut viewport, 50, true).is_none());
        assert_eq!(viewport.scrolls, 0);
    }

    #[test]
    fn manual_scroll_outside_grace_disables() {
        let mut viewport = LineViewport::new(400.0, 20.0);
        let mut controller = AutoScrollController::new(ScrollConfig::default(), true);
        controller.reset_to_top(1_000, &mut viewport);

        assert_eq!(
            controller.observe_scroll(1_050, 50.0),
            ScrollAttribution::Programmatic
        );
        assert!(controller.is_enabled());

        assert_eq!(
            controller.observe_scroll(1_500, 100.0),
            ScrollAttribution::User
        );
        assert!(!controller.is_enabled());
    }

    #[test]
    fn small_scroll_deltas_are_negligible() {
        let mut controller = AutoScrollController::new(ScrollConfig::default(), true);
        assert_eq!(
            controller.observe_scroll(5_000, 8.0),
            ScrollAttribution::Negligible
        );
        assert!(controller.is_enabled());
    }

    #[test]
    fn reenable_recenters_and_shields_stability_window() {
        let mut viewport = LineViewport::new(400.0, 20.0);
        let mut controller = AutoScrollController::new(ScrollConfig::default(), false);

        controller.enable(10_000, &mut viewport, 100);
        assert!(controller.is_enabled());
        // Word 100 centre is 2010px; centred scroll top is 1810px.
        assert_eq!(viewport.top, 1_810.0);
        assert_eq!(viewport.last_behavior, Some(ScrollBehavior::Instant));
        assert_eq!(controller.state().last_programmatic_scroll_at, Some(10_000));

        assert_eq!(
            controller.observe_scroll(14_000, 1_900.0),
            ScrollAttribution::Programmatic
        );
        assert_eq!(
            controller.observe_scroll(15_500, 2_400.0),
            ScrollAttribution::User
        );
    }

    #[test]
    fn gestures_disable_only_when_engaged() {
        let mut controller = AutoScrollController::new(ScrollConfig::default(), true);
        assert_eq!(controller.observe_user_gesture(0), ScrollAttribution::User);
        assert_eq!(
            controller.observe_user_gesture(1_000),
            ScrollAttribution::Negligible
        );
    }

    #[test]
    fn suspension_blocks_corrections() {
        let mut viewport = LineViewport::new(400.0, 20.0);
        let mut controller = AutoScrollController::new(ScrollConfig::default(), true);
        controller.suspend();
        assert!(controller.evaluate(0, &mut viewport, 80, true).is_none());
        controller.resume();
        assert!(controller.evaluate(10, &mut viewport, 80, true).is_some());
    }
}
