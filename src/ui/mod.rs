//! The interactive event loop and the two selection UIs built on it.
//!
//! [`run`] owns the cycle shared by the switcher and the tiler: draw the
//! selector onto the pump's surface, present it, block for one event, and
//! hand the event back to the selector. The loop itself never interprets
//! input beyond the [`InputEvent`] envelope, so every binding lives in the
//! selector that owns it.

use crate::screen::event::InputEvent;
use crate::traits::{EventPump, Outcome, Selector, Step};

pub mod switch;
pub mod tile;

/// Drives `selector` on `pump` until it finishes or the pump is
/// interrupted.
///
/// An [`InputEvent::Interrupted`] wake resolves to [`Outcome::Cancelled`]:
/// interrupts mean the session is over (emulator gone, signal delivered)
/// and there is nothing sensible left to confirm. Device errors are
/// returned as-is.
pub fn run<P, S>(pump: &mut P, selector: &mut S) -> Result<Outcome<S::Choice>, P::Error>
where
    P: EventPump,
    S: Selector,
{
    loop {
        selector.draw(pump.surface_mut());
        pump.present()?;
        let step = match pump.next_event()? {
            InputEvent::Interrupted => return Ok(Outcome::Cancelled),
            InputEvent::Key(key) => selector.on_key(key),
            InputEvent::Mouse(event) => selector.on_mouse(event),
        };
        match step {
            Step::Continue => {}
            Step::Finish(outcome) => return Ok(outcome),
        }
    }
}

//  Tests

#[cfg(test)]
mod tests {
    use super::*;
    use crate::screen::event::{Key, MouseButton, MouseEvent, MouseKind};
    use crate::screen::{Style, Surface};
    use std::collections::VecDeque;

    #[derive(Debug, thiserror::Error)]
    #[error("mock error")]
    struct PumpError;

    struct ScriptedPump {
        surface: Surface,
        events: VecDeque<InputEvent>,
        presented: u32,
    }

    impl ScriptedPump {
        fn new(events: Vec<InputEvent>) -> Self {
            Self {
                surface: Surface::new(10, 2),
                events: events.into(),
                presented: 0,
            }
        }
    }

    impl EventPump for ScriptedPump {
        type Error = PumpError;

        fn surface_mut(&mut self) -> &mut Surface {
            &mut self.surface
        }

        fn present(&mut self) -> Result<(), PumpError> {
            self.presented += 1;
            Ok(())
        }

        fn next_event(&mut self) -> Result<InputEvent, PumpError> {
            self.events.pop_front().ok_or(PumpError)
        }
    }

    /// Counts ordinary keys, confirms the count on Enter, cancels on Esc.
    struct CountingSelector {
        seen: usize,
    }

    impl Selector for CountingSelector {
        type Choice = usize;

        fn viewport(&self) -> (u16, u16) {
            (10, 2)
        }

        fn draw(&self, surface: &mut Surface) {
            surface.print(0, 0, &self.seen.to_string(), Style::plain());
        }

        fn on_key(&mut self, key: Key) -> Step<usize> {
            match key {
                Key::Esc => Step::Finish(Outcome::Cancelled),
                Key::Enter => Step::Finish(Outcome::Confirmed(self.seen)),
                _ => {
                    self.seen += 1;
                    Step::Continue
                }
            }
        }

        fn on_mouse(&mut self, event: MouseEvent) -> Step<usize> {
            if event.kind == MouseKind::Press {
                Step::Finish(Outcome::Confirmed(usize::from(event.col)))
            } else {
                Step::Continue
            }
        }
    }

    #[test]
    fn run_presents_before_every_read_and_finishes_on_demand() {
        let mut pump = ScriptedPump::new(vec![
            InputEvent::Key(Key::Char('a')),
            InputEvent::Key(Key::Char('b')),
            InputEvent::Key(Key::Enter),
        ]);
        let mut selector = CountingSelector { seen: 0 };

        let outcome = run(&mut pump, &mut selector).unwrap();

        assert_eq!(outcome, Outcome::Confirmed(2));
        assert_eq!(pump.presented, 3);
        // The final frame reflects the state before the confirming key.
        assert_eq!(pump.surface.cell(0, 0).unwrap().ch, '2');
    }

    #[test]
    fn interrupt_cancels_without_consulting_the_selector() {
        let mut pump = ScriptedPump::new(vec![InputEvent::Interrupted]);
        let mut selector = CountingSelector { seen: 0 };

        let outcome = run(&mut pump, &mut selector).unwrap();

        assert_eq!(outcome, Outcome::Cancelled);
        assert_eq!(selector.seen, 0);
    }

    #[test]
    fn mouse_events_reach_the_selector() {
        let mut pump = ScriptedPump::new(vec![InputEvent::Mouse(MouseEvent {
            kind: MouseKind::Press,
            button: MouseButton::Left,
            col: 4,
            row: 1,
        })]);
        let mut selector = CountingSelector { seen: 0 };

        let outcome = run(&mut pump, &mut selector).unwrap();

        assert_eq!(outcome, Outcome::Confirmed(4));
    }

    #[test]
    fn device_errors_are_passed_through() {
        let mut pump = ScriptedPump::new(Vec::new());
        let mut selector = CountingSelector { seen: 0 };

        assert!(run(&mut pump, &mut selector).is_err());
    }
}
