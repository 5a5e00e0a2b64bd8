/// Radius changes at or below this size do not invalidate the blurred output.
pub const RADIUS_EPSILON: f32 = 1e-4;

/// Tracks whether the blurred output is stale.
///
/// The controller is Dirty while either flag is set and Clean otherwise. It
/// starts Dirty because nothing has been blurred yet. [`run_if_dirty`] is the
/// only place flags are cleared, and both are cleared together.
///
/// [`run_if_dirty`]: RecomputeController::run_if_dirty
#[derive(Clone, Debug)]
pub struct RecomputeController {
    applied_radius: Option<f32>,
    requested_radius: f32,
    image_changed: bool,
    radius_changed: bool,
}

impl RecomputeController {
    pub fn new(initial_radius: f32) -> Self {
        Self {
            applied_radius: None,
            requested_radius: initial_radius,
            image_changed: false,
            radius_changed: true,
        }
    }

    pub fn on_radius_changed(&mut self, radius: f32) {
        self.requested_radius = radius;
        self.radius_changed = match self.applied_radius {
            Some(applied) => (radius - applied).abs() > RADIUS_EPSILON,
            None => true,
        };
    }

    pub fn on_image_loaded(&mut self) {
        self.image_changed = true;
    }

    pub fn is_dirty(&self) -> bool {
        self.image_changed || self.radius_changed
    }

    pub fn applied_radius(&self) -> Option<f32> {
        self.applied_radius
    }

    /// Runs `blur` with the requested radius if the output is stale.
    ///
    /// On success the radius is recorded and the controller is Clean. On
    /// failure the flags are cleared too and nothing is recorded: the same
    /// inputs would fail the same way, so the next attempt waits for a new
    /// radius, image or device.
    pub fn run_if_dirty<E>(
        &mut self,
        blur: impl FnOnce(f32) -> Result<(), E>,
    ) -> Result<bool, E> {
        if !self.is_dirty() {
            return Ok(false);
        }
        let radius = self.requested_radius;
        self.image_changed = false;
        self.radius_changed = false;
        blur(radius)?;
        self.applied_radius = Some(radius);
        Ok(true)
    }

    /// Forgets the applied radius so the next tick recomputes.
    pub fn invalidate(&mut self) {
        self.applied_radius = None;
        self.image_changed = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn tick(controller: &mut RecomputeController) -> bool {
        controller
            .run_if_dirty(|_| Ok::<(), ()>(()))
            .unwrap_or(false)
    }

    #[test]
    fn starts_dirty_and_cleans_after_one_run() {
        let mut controller = RecomputeController::new(5.0);
        assert!(controller.is_dirty());
        assert!(tick(&mut controller));
        assert!(!controller.is_dirty());
        assert_eq!(controller.applied_radius(), Some(5.0));
        assert!(!tick(&mut controller));
    }

    #[test]
    fn radius_changes_within_epsilon_are_ignored() {
        let mut controller = RecomputeController::new(5.0);
        tick(&mut controller);
        controller.on_radius_changed(5.0 + RADIUS_EPSILON / 2.0);
        assert!(!controller.is_dirty());
        controller.on_radius_changed(5.01);
        assert!(controller.is_dirty());
    }

    #[test]
    fn returning_to_applied_radius_cleans_radius_flag() {
        let mut controller = RecomputeController::new(5.0);
        tick(&mut controller);
        controller.on_radius_changed(9.0);
        controller.on_radius_changed(5.0);
        assert!(!controller.is_dirty());
    }

    #[test]
    fn image_and_radius_in_one_frame_blur_once() {
        let mut controller = RecomputeController::new(5.0);
        tick(&mut controller);
        controller.on_image_loaded();
        controller.on_radius_changed(8.0);

        let mut calls = Vec::new();
        controller
            .run_if_dirty(|radius| {
                calls.push(radius);
                Ok::<(), ()>(())
            })
            .unwrap();
        assert_eq!(calls, vec![8.0]);
        assert!(!controller.is_dirty());
    }

    #[test]
    fn failed_blur_clears_flags_without_recording() {
        let mut controller = RecomputeController::new(5.0);
        let result = controller.run_if_dirty(|_| Err("surface lost"));
        assert_eq!(result, Err("surface lost"));
        assert!(!controller.is_dirty());
        assert_eq!(controller.applied_radius(), None);

        controller.on_radius_changed(5.0);
        assert!(controller.is_dirty());
    }

    #[test]
    fn invalidate_forces_recompute() {
        let mut controller = RecomputeController::new(3.0);
        tick(&mut controller);
        controller.invalidate();
        assert!(controller.is_dirty());
        assert!(tick(&mut controller));
    }

    #[derive(Clone, Debug)]
    enum Event {
        Radius(f32),
        Image,
        Tick,
    }

    fn event() -> impl Strategy<Value = Event> {
        prop_oneof![
            (0.001f32..120.0).prop_map(Event::Radius),
            Just(Event::Image),
            Just(Event::Tick),
        ]
    }

    proptest! {
        #[test]
        fn blurs_once_per_run_of_changes(events in prop::collection::vec(event(), 0..64)) {
            let mut controller = RecomputeController::new(5.0);
            // Mirror of the controller's view: last blurred radius and pending image.
            let mut applied: Option<f32> = None;
            let mut requested = 5.0f32;
            let mut image_pending = false;

            for event in events.iter().chain(std::iter::once(&Event::Tick)) {
                match event {
                    Event::Radius(radius) => {
                        requested = *radius;
                        controller.on_radius_changed(*radius);
                    }
                    Event::Image => {
                        image_pending = true;
                        controller.on_image_loaded();
                    }
                    Event::Tick => {
                        let stale = image_pending
                            || applied.map_or(true, |a| (requested - a).abs() > RADIUS_EPSILON);
                        let mut calls = 0;
                        let ran = controller
                            .run_if_dirty(|radius| {
                                calls += 1;
                                prop_assert_eq!(radius, requested);
                                Ok(())
                            })?;
                        prop_assert!(calls <= 1);
                        prop_assert_eq!(ran, stale);
                        prop_assert_eq!(calls == 1, stale);
                        if ran {
                            applied = Some(requested);
                            image_pending = false;
                        }
                        prop_assert!(!controller.is_dirty());
                    }
                }
            }
        }
    }
}
