use egui::{Context, Key, Modifiers, PointerButton, Pos2, Rect};

/// Represents which panel an input event occurred in
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PanelKind {
    /// The editing canvas
    Central,
    /// The tools side panel
    Tools,
    /// Outside any known panel, and keyboard input
    Global,
}

/// Represents the location where an input event occurred
#[derive(Debug, Clone, Copy)]
pub struct InputLocation {
    /// The position in screen coordinates
    pub position: Pos2,
    /// The panel in which the event occurred
    pub panel: PanelKind,
}

impl InputLocation {
    pub fn is_on_canvas(&self) -> bool {
        self.panel == PanelKind::Central
    }
}

/// Keys the canvas reacts to
const CANVAS_KEYS: [Key; 7] = [
    Key::Space,
    Key::Delete,
    Key::Backspace,
    Key::ArrowUp,
    Key::ArrowDown,
    Key::ArrowLeft,
    Key::ArrowRight,
];

/// Raw egui input reduced to what the canvas cares about
#[derive(Debug, Clone)]
pub enum InputEvent {
    PointerDown {
        location: InputLocation,
        button: PointerButton,
        modifiers: Modifiers,
    },
    PointerUp {
        location: InputLocation,
        button: PointerButton,
        modifiers: Modifiers,
    },
    /// Pointer moved, with or without buttons held
    PointerMove {
        location: InputLocation,
        modifiers: Modifiers,
    },
    /// Pointer left the window
    PointerLeave,
    /// Wheel travel. Positive `delta_y` means scrolling down, away from the
    /// content, which zooms out.
    Wheel {
        location: InputLocation,
        delta_y: f32,
    },
    KeyDown {
        key: Key,
        modifiers: Modifiers,
    },
    KeyUp {
        key: Key,
    },
}

/// Handles converting raw egui input into canvas `InputEvent`s
#[derive(Debug, Default)]
pub struct InputHandler {
    last_pointer_pos: Option<Pos2>,
    central_panel_rect: Option<Rect>,
    tools_panel_rect: Option<Rect>,
}

impl InputHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_central_panel_rect(&mut self, rect: Rect) {
        self.central_panel_rect = Some(rect);
    }

    pub fn set_tools_panel_rect(&mut self, rect: Rect) {
        self.tools_panel_rect = Some(rect);
    }

    pub fn central_panel_rect(&self) -> Option<Rect> {
        self.central_panel_rect
    }

    fn determine_panel(&self, pos: Pos2) -> PanelKind {
        if self.central_panel_rect.is_some_and(|r| r.contains(pos)) {
            return PanelKind::Central;
        }
        if self.tools_panel_rect.is_some_and(|r| r.contains(pos)) {
            return PanelKind::Tools;
        }
        PanelKind::Global
    }

    fn make_location(&self, pos: Pos2) -> InputLocation {
        InputLocation {
            position: pos,
            panel: self.determine_panel(pos),
        }
    }

    /// Process raw egui input and generate our InputEvents
    pub fn process_input(&mut self, ctx: &Context) -> Vec<InputEvent> {
        let mut events = Vec::new();
        let wants_keyboard = ctx.wants_keyboard_input();

        ctx.input(|input| {
            let modifiers = input.modifiers;

            match input.pointer.hover_pos() {
                Some(pos) => {
                    if Some(pos) != self.last_pointer_pos {
                        events.push(InputEvent::PointerMove {
                            location: self.make_location(pos),
                            modifiers,
                        });
                    }
                    self.last_pointer_pos = Some(pos);
                }
                None => {
                    if self.last_pointer_pos.take().is_some() {
                        events.push(InputEvent::PointerLeave);
                    }
                }
            }

            if let Some(pos) = input.pointer.hover_pos().or(self.last_pointer_pos) {
                for button in [PointerButton::Primary, PointerButton::Secondary, PointerButton::Middle] {
                    if input.pointer.button_pressed(button) {
                        events.push(InputEvent::PointerDown {
                            location: self.make_location(pos),
                            button,
                            modifiers,
                        });
                    }
                    if input.pointer.button_released(button) {
                        events.push(InputEvent::PointerUp {
                            location: self.make_location(pos),
                            button,
                            modifiers,
                        });
                    }
                }

                // egui reports upward travel as positive
                let scroll = input.raw_scroll_delta.y;
                if scroll != 0.0 {
                    events.push(InputEvent::Wheel {
                        location: self.make_location(pos),
                        delta_y: -scroll,
                    });
                }
            }

            if wants_keyboard {
                return;
            }
            for event in &input.events {
                if let egui::Event::Key {
                    key,
                    pressed,
                    repeat,
                    modifiers,
                    ..
                } = event
                {
                    if !CANVAS_KEYS.contains(key) {
                        continue;
                    }
                    if *pressed {
                        // Held space repeats; only the first press matters
                        if *repeat && *key == Key::Space {
                            continue;
                        }
                        events.push(InputEvent::KeyDown {
                            key: *key,
                            modifiers: *modifiers,
                        });
                    } else {
                        events.push(InputEvent::KeyUp { key: *key });
                    }
                }
            }
        });

        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use egui::pos2;

    #[test]
    fn test_panel_classification() {
        let mut handler = InputHandler::new();
        handler.set_tools_panel_rect(Rect::from_min_max(pos2(0.0, 0.0), pos2(100.0, 600.0)));
        handler.set_central_panel_rect(Rect::from_min_max(pos2(100.0, 0.0), pos2(800.0, 600.0)));
        assert!(handler.make_location(pos2(300.0, 300.0)).is_on_canvas());
        assert_eq!(handler.make_location(pos2(50.0, 300.0)).panel, PanelKind::Tools);
        assert_eq!(handler.make_location(pos2(900.0, 300.0)).panel, PanelKind::Global);
    }
}
