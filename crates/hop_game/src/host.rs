//! The host owns the real display regions. The simulation only asks it to
//! open, move, focus and close them, and reads back where they ended up.
//!
//! [`SimulatedHost`] keeps everything in memory. Tests and the headless
//! binary run against it.

use glam::DVec2;
use hop_core::geometry::Aabb;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScreenId(pub u32);

/// Host-side identity of an open region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WindowHandle(pub u64);

/// Usable area of one physical screen.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScreenRect {
    pub id: ScreenId,
    pub bounds: Aabb,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewportFrame {
    pub position: DVec2,
    pub size: DVec2,
    pub focused: bool,
    pub closed: bool,
    pub screen: ScreenId,
}

impl ViewportFrame {
    pub fn bounds(&self) -> Aabb {
        Aabb::from_position_size(self.position, self.size)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OpenRequest {
    pub position: DVec2,
    pub size: DVec2,
    pub allow_resize: bool,
    pub fullscreen: bool,
}

pub trait ViewportHost {
    /// `None` when the host refuses (e.g. blocked pop-ups).
    fn open(&mut self, request: &OpenRequest) -> Option<WindowHandle>;
    fn close(&mut self, window: WindowHandle);
    /// `None` once the window is gone.
    fn frame(&self, window: WindowHandle) -> Option<ViewportFrame>;
    fn move_by(&mut self, window: WindowHandle, delta: DVec2);
    fn move_to(&mut self, window: WindowHandle, position: DVec2);
    fn focus(&mut self, window: WindowHandle);
    fn screens(&self) -> Vec<ScreenRect>;
    /// Screen new levels are laid out on.
    fn primary_screen(&self) -> ScreenRect;
    /// Envelope of every active region. Out-of-bounds checks and stereo pan
    /// are measured against this.
    fn aggregate_bounds(&self) -> Option<Aabb>;

    /// Move `window` to another screen, keeping its centre at the same
    /// relative spot. With a single screen the window instead wraps one
    /// window-width to the right. Returns the centre before and after.
    fn teleport(&mut self, window: WindowHandle) -> Option<(DVec2, DVec2)> {
        let frame = self.frame(window)?;
        let screens = self.screens();
        let current = screens
            .iter()
            .find(|screen| screen.id == frame.screen)
            .copied()
            .unwrap_or_else(|| self.primary_screen());
        let before = frame.bounds().center();

        let target = match screens.iter().find(|screen| screen.id != current.id) {
            Some(other) => {
                let fraction = (before - current.bounds.top_left())
                    / DVec2::new(current.bounds.width(), current.bounds.height());
                let centre = other.bounds.top_left()
                    + fraction * DVec2::new(other.bounds.width(), other.bounds.height());
                centre - frame.size / 2.0
            }
            None => {
                let left = current.bounds.x1;
                let width = current.bounds.width();
                let x = left + (frame.position.x - left + frame.size.x).rem_euclid(width);
                DVec2::new(x, frame.position.y)
            }
        };
        self.move_to(window, target);
        let after = self.frame(window)?.bounds().center();
        Some((before, after))
    }
}

#[derive(Debug, Clone)]
struct SimWindow {
    handle: WindowHandle,
    frame: ViewportFrame,
    open: bool,
}

/// In-memory host: screens are fixed rectangles, windows are plain frames.
#[derive(Debug, Clone)]
pub struct SimulatedHost {
    screens: Vec<ScreenRect>,
    primary: usize,
    windows: Vec<SimWindow>,
    next_handle: u64,
    refuse_after: Option<usize>,
}

impl SimulatedHost {
    /// `screens` must not be empty. The first screen is primary.
    pub fn new(screens: Vec<Aabb>) -> Self {
        let screens = screens
            .into_iter()
            .enumerate()
            .map(|(index, bounds)| ScreenRect {
                id: ScreenId(index as u32),
                bounds,
            })
            .collect();
        Self {
            screens,
            primary: 0,
            windows: Vec::new(),
            next_handle: 1,
            refuse_after: None,
        }
    }

    pub fn single_screen(width: f64, height: f64) -> Self {
        Self::new(vec![Aabb::new(0.0, 0.0, width, height)])
    }

    /// Two screens side by side; levels open on the right one.
    pub fn dual_screen(width: f64, height: f64) -> Self {
        let mut host = Self::new(vec![
            Aabb::new(0.0, 0.0, width, height),
            Aabb::new(width, 0.0, width * 2.0, height),
        ]);
        host.primary = 1;
        host
    }

    /// Refuse every open after the first `count` successful ones.
    pub fn refuse_opens_after(&mut self, count: usize) {
        self.refuse_after = Some(count);
    }

    /// Simulate the user closing a window from outside the game.
    pub fn close_externally(&mut self, window: WindowHandle) {
        if let Some(sim) = self.window_mut(window) {
            sim.frame.closed = true;
        }
    }

    /// Simulate the user dragging a window.
    pub fn drag(&mut self, window: WindowHandle, delta: DVec2) {
        self.move_by(window, delta);
    }

    /// Simulate every window losing focus to something outside the game.
    pub fn blur_all(&mut self) {
        for sim in &mut self.windows {
            sim.frame.focused = false;
        }
    }

    pub fn open_windows(&self) -> Vec<WindowHandle> {
        self.windows
            .iter()
            .filter(|sim| sim.open)
            .map(|sim| sim.handle)
            .collect()
    }

    fn window(&self, window: WindowHandle) -> Option<&SimWindow> {
        self.windows
            .iter()
            .find(|sim| sim.handle == window && sim.open)
    }

    fn window_mut(&mut self, window: WindowHandle) -> Option<&mut SimWindow> {
        self.windows
            .iter_mut()
            .find(|sim| sim.handle == window && sim.open)
    }

    fn screen_at(&self, point: DVec2) -> ScreenId {
        self.screens
            .iter()
            .find(|screen| screen.bounds.contains_point(point))
            .or_else(|| self.screens.get(self.primary))
            .map(|screen| screen.id)
            .unwrap_or(ScreenId(0))
    }

    fn place(&mut self, window: WindowHandle, position: DVec2) {
        let Some(index) = self
            .windows
            .iter()
            .position(|sim| sim.handle == window && sim.open)
        else {
            return;
        };
        let centre = position + self.windows[index].frame.size / 2.0;
        let screen = self.screen_at(centre);
        let frame = &mut self.windows[index].frame;
        frame.position = position;
        frame.screen = screen;
    }
}

impl ViewportHost for SimulatedHost {
    fn open(&mut self, request: &OpenRequest) -> Option<WindowHandle> {
        let open_count = self.windows.iter().filter(|sim| sim.open).count();
        if self.refuse_after.is_some_and(|limit| open_count >= limit) {
            return None;
        }
        let handle = WindowHandle(self.next_handle);
        self.next_handle += 1;
        for sim in &mut self.windows {
            sim.frame.focused = false;
        }
        let centre = request.position + request.size / 2.0;
        self.windows.push(SimWindow {
            handle,
            frame: ViewportFrame {
                position: request.position,
                size: request.size,
                focused: true,
                closed: false,
                screen: self.screen_at(centre),
            },
            open: true,
        });
        Some(handle)
    }

    fn close(&mut self, window: WindowHandle) {
        if let Some(sim) = self.window_mut(window) {
            sim.open = false;
            sim.frame.closed = true;
            sim.frame.focused = false;
        }
    }

    fn frame(&self, window: WindowHandle) -> Option<ViewportFrame> {
        self.window(window).map(|sim| sim.frame)
    }

    fn move_by(&mut self, window: WindowHandle, delta: DVec2) {
        if let Some(position) = self.window(window).map(|sim| sim.frame.position) {
            self.place(window, position + delta);
        }
    }

    fn move_to(&mut self, window: WindowHandle, position: DVec2) {
        self.place(window, position);
    }

    fn focus(&mut self, window: WindowHandle) {
        if self.window(window).is_none() {
            return;
        }
        for sim in &mut self.windows {
            sim.frame.focused = sim.handle == window && sim.open;
        }
    }

    fn screens(&self) -> Vec<ScreenRect> {
        self.screens.clone()
    }

    fn primary_screen(&self) -> ScreenRect {
        self.screens
            .get(self.primary)
            .or_else(|| self.screens.first())
            .copied()
            .unwrap_or(ScreenRect {
                id: ScreenId(0),
                bounds: Aabb::new(0.0, 0.0, 0.0, 0.0),
            })
    }

    fn aggregate_bounds(&self) -> Option<Aabb> {
        let boxes: Vec<Aabb> = self
            .windows
            .iter()
            .filter(|sim| sim.open && !sim.frame.closed)
            .map(|sim| sim.frame.bounds())
            .collect();
        Aabb::envelope(&boxes)
    }
}
