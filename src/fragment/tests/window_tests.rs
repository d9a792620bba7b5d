//! Sliding window acceptance and expiry.

use rstest::{fixture, rstest};

use crate::fragment::SlidingWindow;

#[fixture]
fn window() -> SlidingWindow { SlidingWindow::new(128, 16).expect("valid window") }

fn feed(window: &mut SlidingWindow, frames: impl IntoIterator<Item = u32>) -> Vec<u32> {
    let mut expired = Vec::new();
    for frame in frames {
        assert!(window.seen(frame, |f| expired.push(f)), "frame {frame} rejected");
    }
    expired
}

#[rstest]
#[case(128, 0)]
#[case(128, 128)]
#[case(8, 9)]
fn invalid_windows_are_refused(#[case] capacity: u32, #[case] size: u32) {
    assert!(SlidingWindow::new(capacity, size).is_none());
}

#[rstest]
fn first_frame_is_always_accepted(mut window: SlidingWindow) {
    assert!(window.seen(90, |_| panic!("nothing to expire")));
    assert!(window.is_active(90));
    assert_eq!(window.first_outstanding(), 90);
}

#[rstest]
fn filling_the_window_expires_nothing(mut window: SlidingWindow) {
    assert!(feed(&mut window, 0..16).is_empty());
    assert_eq!(window.allocated(), 16);
    assert!((0..16).all(|f| window.is_active(f)));
}

#[rstest]
fn sliding_expires_oldest_first(mut window: SlidingWindow) {
    let expired = feed(&mut window, 0..20);
    assert_eq!(expired, vec![0, 1, 2, 3]);
    assert_eq!(window.first_outstanding(), 4);
}

#[test]
fn jumping_ahead_expires_skipped_span() {
    let mut window = SlidingWindow::new(8, 4).expect("valid window");
    assert!(feed(&mut window, [0, 3]).is_empty());
    let expired = feed(&mut window, [6]);
    assert_eq!(expired, vec![0, 1, 2]);
    assert!((3..=6).all(|f| window.is_active(f)));
}

#[test]
fn expiry_wraps_around_capacity() {
    let mut window = SlidingWindow::new(8, 4).expect("valid window");
    let expired = feed(&mut window, (0..10).map(|f| f % 8));
    assert_eq!(expired, vec![0, 1, 2, 3, 4, 5]);
    assert_eq!(window.first_outstanding(), 6);
    assert!(window.is_active(1));
}

#[rstest]
fn stale_and_distant_frames_are_rejected(mut window: SlidingWindow) {
    feed(&mut window, 0..=20);
    assert!(!window.seen(2, |_| panic!("no expiry")), "stale frame accepted");
    assert!(!window.seen(60, |_| panic!("no expiry")), "distant frame accepted");
    assert_eq!(window.first_outstanding(), 5);
}

#[rstest]
fn active_frames_do_not_move_the_window(mut window: SlidingWindow) {
    feed(&mut window, 0..5);
    let before = window.clone();
    assert!(window.seen(2, |_| panic!("no expiry")));
    assert_eq!(window, before);
}

#[rstest]
fn out_of_range_frames_are_rejected(mut window: SlidingWindow) {
    assert!(!window.seen(128, |_| {}));
    assert_eq!(window.allocated(), 0);
}

#[rstest]
fn reset_forgets_everything(mut window: SlidingWindow) {
    feed(&mut window, 0..3);
    window.reset();
    assert_eq!(window.allocated(), 0);
    assert!(!window.is_active(1));
}
