use instant::{Duration, Instant};
use merge_ngin::input::{
    DOUBLE_CLICK_WINDOW, MouseButtonTracker, MouseTracker, PointerAction,
};
use winit::{
    dpi::PhysicalPosition,
    event::{DeviceId, ElementState, MouseButton, WindowEvent},
};

fn pos(x: f64, y: f64) -> PhysicalPosition<f64> {
    PhysicalPosition::new(x, y)
}

fn click(tracker: &mut MouseButtonTracker, at: PhysicalPosition<f64>, now: Instant) -> Option<PointerAction> {
    let pressed = tracker.on_button(ElementState::Pressed, at, now);
    tracker.on_button(ElementState::Released, at, now);
    pressed
}

#[test]
fn second_press_nearby_is_a_double_click() {
    let start = Instant::now();
    let mut tracker = MouseButtonTracker::new(MouseButton::Left);

    assert!(matches!(click(&mut tracker, pos(10.0, 10.0), start), Some(PointerAction::Down { .. })));
    let second = click(&mut tracker, pos(12.0, 11.0), start + Duration::from_millis(120));
    assert_eq!(
        second,
        Some(PointerAction::DoubleClick {
            button: MouseButton::Left,
            position: pos(12.0, 11.0),
        })
    );
    // a third press starts a new sequence
    let third = click(&mut tracker, pos(12.0, 11.0), start + Duration::from_millis(200));
    assert!(matches!(third, Some(PointerAction::Down { .. })));
}

#[test]
fn slow_or_distant_presses_are_separate_clicks() {
    let start = Instant::now();
    let mut tracker = MouseButtonTracker::new(MouseButton::Left);

    click(&mut tracker, pos(0.0, 0.0), start);
    let late = click(&mut tracker, pos(0.0, 0.0), start + DOUBLE_CLICK_WINDOW + Duration::from_millis(1));
    assert!(matches!(late, Some(PointerAction::Down { .. })));

    let later = start + DOUBLE_CLICK_WINDOW * 4;
    click(&mut tracker, pos(0.0, 0.0), later);
    let far = click(&mut tracker, pos(30.0, 0.0), later + Duration::from_millis(50));
    assert!(matches!(far, Some(PointerAction::Down { .. })));
}

#[test]
fn release_without_press_reports_nothing() {
    let mut tracker = MouseButtonTracker::new(MouseButton::Right);
    assert_eq!(tracker.on_button(ElementState::Released, pos(1.0, 1.0), Instant::now()), None);
    assert!(!tracker.is_down());
}

#[test]
fn drags_only_while_a_button_is_held() {
    let mut mouse = MouseTracker::new();
    let now = Instant::now();

    assert!(mouse.on_cursor_moved(pos(5.0, 5.0)).is_empty());
    assert!(matches!(
        mouse.on_button(MouseButton::Middle, ElementState::Pressed, now),
        Some(PointerAction::Down { button: MouseButton::Middle, .. })
    ));
    assert_eq!(
        mouse.on_cursor_moved(pos(6.0, 7.0)),
        vec![PointerAction::Drag {
            button: MouseButton::Middle,
            position: pos(6.0, 7.0),
        }]
    );
    assert!(matches!(
        mouse.on_button(MouseButton::Middle, ElementState::Released, now),
        Some(PointerAction::Up { position, .. }) if position == pos(6.0, 7.0)
    ));
    assert!(mouse.on_cursor_moved(pos(8.0, 8.0)).is_empty());
    assert_eq!(mouse.pick_coords(), (8.0, 8.0));
}

#[test]
fn other_buttons_are_ignored() {
    let mut mouse = MouseTracker::new();
    assert_eq!(mouse.on_button(MouseButton::Back, ElementState::Pressed, Instant::now()), None);
}

#[test]
fn window_events_drive_the_trackers() {
    let device_id = unsafe { DeviceId::dummy() };
    let mut mouse = MouseTracker::new();

    let moved = WindowEvent::CursorMoved { device_id, position: pos(5.0, 6.0) };
    assert!(mouse.handle_window_event(&moved).is_empty());
    assert_eq!(mouse.pick_coords(), (5.0, 6.0));

    let press = WindowEvent::MouseInput {
        device_id,
        state: ElementState::Pressed,
        button: MouseButton::Left,
    };
    let actions = mouse.handle_window_event(&press);
    assert!(matches!(
        actions.as_slice(),
        [PointerAction::Down { button: MouseButton::Left, position }] if *position == pos(5.0, 6.0)
    ));
    assert!(mouse.handle_window_event(&WindowEvent::Focused(true)).is_empty());
}
