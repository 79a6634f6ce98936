//! [`WindowSystem`] implementation backed by EWMH root-window hints.
//!
//! Reads desktop and window state from the usual `_NET_*` properties and
//! requests changes with client messages to the root window, the same way
//! a pager would. Geometry changes go through `ConfigureWindow` directly
//! because some window managers do not honor `_NET_MOVERESIZE_WINDOW`.

use log::debug;
use x11rb::connection::Connection;
use x11rb::protocol::xinerama::ConnectionExt as _;
use x11rb::protocol::xproto::{
    Atom, AtomEnum, ClientMessageEvent, ConfigureWindowAux, ConnectionExt as _, EventMask, Window,
};
use x11rb::rust_connection::RustConnection;

use crate::model::{DesktopInfo, Region, WindowInfo};
use crate::traits::WindowSystem;

/// `_NET_WM_DESKTOP` value of a window pinned to every desktop.
const ALL_DESKTOPS: u32 = 0xFFFF_FFFF;
/// `WM_HINTS` urgency flag, bit 8 of the flags word.
const URGENCY_HINT: u32 = 1 << 8;
/// Source indication for client messages: 2 marks a pager-like tool.
const SOURCE_PAGER: u32 = 2;

x11rb::atom_manager! {
    Atoms: AtomsCookie {
        _NET_NUMBER_OF_DESKTOPS,
        _NET_DESKTOP_NAMES,
        _NET_CURRENT_DESKTOP,
        _NET_CLIENT_LIST,
        _NET_ACTIVE_WINDOW,
        _NET_CLOSE_WINDOW,
        _NET_WM_NAME,
        _NET_WM_DESKTOP,
        UTF8_STRING,
    }
}

/// Errors from the X connection or from individual requests.
#[derive(Debug, thiserror::Error)]
pub enum X11Error {
    #[error("connecting to the X server: {0}")]
    Connect(#[from] x11rb::errors::ConnectError),
    #[error("X connection: {0}")]
    Connection(#[from] x11rb::errors::ConnectionError),
    #[error("X request: {0}")]
    Reply(#[from] x11rb::errors::ReplyError),
}

/// EWMH-backed window system on the default screen of `$DISPLAY`.
pub struct X11Ws {
    conn: RustConnection,
    root: Window,
    root_width: u16,
    root_height: u16,
    atoms: Atoms,
}

impl X11Ws {
    pub fn open() -> Result<X11Ws, X11Error> {
        let (conn, screen_num) = x11rb::connect(None)?;
        let atoms = Atoms::new(&conn)?.reply()?;
        let screen = &conn.setup().roots[screen_num];
        Ok(X11Ws {
            root: screen.root,
            root_width: screen.width_in_pixels,
            root_height: screen.height_in_pixels,
            conn,
            atoms,
        })
    }

    //  Property readers

    fn card32(&self, window: Window, property: Atom) -> Result<Option<u32>, X11Error> {
        let reply = self
            .conn
            .get_property(false, window, property, AtomEnum::ANY, 0, 1)?
            .reply()?;
        Ok(reply.value32().and_then(|mut values| values.next()))
    }

    fn card32_list(&self, window: Window, property: Atom) -> Result<Vec<u32>, X11Error> {
        let reply = self
            .conn
            .get_property(false, window, property, AtomEnum::ANY, 0, u32::MAX)?
            .reply()?;
        Ok(reply
            .value32()
            .map(|values| values.collect())
            .unwrap_or_default())
    }

    fn desktop_names(&self, count: usize) -> Result<Vec<String>, X11Error> {
        let reply = self
            .conn
            .get_property(
                false,
                self.root,
                self.atoms._NET_DESKTOP_NAMES,
                self.atoms.UTF8_STRING,
                0,
                u32::MAX,
            )?
            .reply()?;
        Ok(split_names(&reply.value, count))
    }

    /// `_NET_WM_NAME`, falling back to the ICCCM `WM_NAME` for clients
    /// that never set the EWMH property.
    fn window_name(&self, window: Window) -> Result<String, X11Error> {
        let reply = self
            .conn
            .get_property(
                false,
                window,
                self.atoms._NET_WM_NAME,
                self.atoms.UTF8_STRING,
                0,
                u32::MAX,
            )?
            .reply()?;
        if reply.value_len > 0 {
            return Ok(String::from_utf8_lossy(&reply.value).into_owned());
        }
        let reply = self
            .conn
            .get_property(false, window, AtomEnum::WM_NAME, AtomEnum::ANY, 0, u32::MAX)?
            .reply()?;
        Ok(String::from_utf8_lossy(&reply.value).into_owned())
    }

    fn window_urgent(&self, window: Window) -> Result<bool, X11Error> {
        let reply = self
            .conn
            .get_property(
                false,
                window,
                AtomEnum::WM_HINTS,
                AtomEnum::WM_HINTS,
                0,
                9,
            )?
            .reply()?;
        let flags = reply.value32().and_then(|mut values| values.next());
        Ok(flags.unwrap_or(0) & URGENCY_HINT != 0)
    }

    /// Physical heads when the Xinerama extension is present and active.
    /// Any failure here means single-head, not a hard error.
    fn xinerama_heads(&self) -> Option<Vec<Region>> {
        let active = self.conn.xinerama_is_active().ok()?.reply().ok()?;
        if active.state == 0 {
            return None;
        }
        let screens = self.conn.xinerama_query_screens().ok()?.reply().ok()?;
        let heads: Vec<Region> = screens
            .screen_info
            .iter()
            .map(|info| Region {
                x: i32::from(info.x_org),
                y: i32::from(info.y_org),
                width: u32::from(info.width),
                height: u32::from(info.height),
            })
            .collect();
        if heads.is_empty() {
            None
        } else {
            Some(heads)
        }
    }

    //  Requests

    /// Sends a pager-style client message to the root window.
    fn client_message(
        &self,
        window: Window,
        message: Atom,
        data: [u32; 5],
    ) -> Result<(), X11Error> {
        let event = ClientMessageEvent::new(32, window, message, data);
        self.conn
            .send_event(
                false,
                self.root,
                EventMask::SUBSTRUCTURE_NOTIFY | EventMask::SUBSTRUCTURE_REDIRECT,
                event,
            )?
            .check()?;
        Ok(())
    }

    fn set_current_desktop(&self, desktop: usize) -> Result<(), X11Error> {
        self.client_message(
            self.root,
            self.atoms._NET_CURRENT_DESKTOP,
            [desktop as u32, 0, 0, 0, 0],
        )
    }
}

//  WindowSystem implementation

impl WindowSystem for X11Ws {
    type Error = X11Error;

    fn desktops(&self) -> Result<Vec<DesktopInfo>, X11Error> {
        let count = self
            .card32(self.root, self.atoms._NET_NUMBER_OF_DESKTOPS)?
            .unwrap_or(1) as usize;
        let current = self
            .card32(self.root, self.atoms._NET_CURRENT_DESKTOP)?
            .unwrap_or(0) as usize;
        let active = self.active_window()?;
        let names = self.desktop_names(count)?;

        let mut desktops: Vec<DesktopInfo> = names
            .into_iter()
            .enumerate()
            .map(|(index, name)| DesktopInfo {
                index,
                name,
                is_current: index == current,
                is_urgent: false,
                windows: Vec::new(),
            })
            .collect();

        for window in self.card32_list(self.root, self.atoms._NET_CLIENT_LIST)? {
            let raw = self
                .card32(window, self.atoms._NET_WM_DESKTOP)?
                .unwrap_or(0);
            // Sticky windows are on every desktop; group them under the
            // current one.
            let desk = if raw == ALL_DESKTOPS {
                current
            } else {
                raw as usize
            };
            if desk >= desktops.len() {
                debug!("window 0x{:x} reports out-of-range desktop {}", window, desk);
                continue;
            }
            let is_urgent = self.window_urgent(window)?;
            let info = WindowInfo {
                id: window,
                name: self.window_name(window)?,
                is_active: active == Some(window),
                is_urgent,
            };
            let desktop = &mut desktops[desk];
            desktop.is_urgent = desktop.is_urgent || is_urgent;
            desktop.windows.push(info);
        }
        Ok(desktops)
    }

    fn heads(&self) -> Result<Vec<Region>, X11Error> {
        if let Some(heads) = self.xinerama_heads() {
            return Ok(heads);
        }
        Ok(vec![Region {
            x: 0,
            y: 0,
            width: u32::from(self.root_width),
            height: u32::from(self.root_height),
        }])
    }

    fn active_window(&self) -> Result<Option<u32>, X11Error> {
        Ok(self
            .card32(self.root, self.atoms._NET_ACTIVE_WINDOW)?
            .filter(|&window| window != 0))
    }

    /// The window's outer position in root coordinates, which is what the
    /// grid math needs; plain `GetGeometry` coordinates are relative to
    /// the window manager's frame.
    fn window_geometry(&self, window: u32) -> Result<Region, X11Error> {
        let geometry = self.conn.get_geometry(window)?.reply()?;
        let translated = self
            .conn
            .translate_coordinates(window, self.root, 0, 0)?
            .reply()?;
        Ok(Region {
            x: i32::from(translated.dst_x),
            y: i32::from(translated.dst_y),
            width: u32::from(geometry.width),
            height: u32::from(geometry.height),
        })
    }

    fn activate_window(&self, window: u32, desktop: usize) -> Result<(), X11Error> {
        debug!("activating 0x{:x} on desktop {}", window, desktop);
        self.set_current_desktop(desktop)?;
        self.focus_window(window)
    }

    fn focus_window(&self, window: u32) -> Result<(), X11Error> {
        self.client_message(
            window,
            self.atoms._NET_ACTIVE_WINDOW,
            [SOURCE_PAGER, 0, 0, 0, 0],
        )
    }

    fn close_window(&self, window: u32) -> Result<(), X11Error> {
        debug!("requesting close of 0x{:x}", window);
        self.client_message(
            window,
            self.atoms._NET_CLOSE_WINDOW,
            [0, SOURCE_PAGER, 0, 0, 0],
        )
    }

    fn move_resize_window(&self, window: u32, region: Region) -> Result<(), X11Error> {
        debug!(
            "moving 0x{:x} to {},{} {}x{}",
            window, region.x, region.y, region.width, region.height
        );
        let values = ConfigureWindowAux::new()
            .x(region.x)
            .y(region.y)
            .width(region.width)
            .height(region.height);
        self.conn.configure_window(window, &values)?.check()?;
        Ok(())
    }
}

/// Splits the NUL-separated `_NET_DESKTOP_NAMES` blob into exactly
/// `count` names. The property may name fewer desktops than exist;
/// missing names become the desktop's index.
fn split_names(bytes: &[u8], count: usize) -> Vec<String> {
    let mut names: Vec<String> = bytes
        .split(|&b| b == 0)
        .map(|chunk| String::from_utf8_lossy(chunk).into_owned())
        .collect();
    // A trailing NUL leaves one empty entry behind.
    if names.last().is_some_and(String::is_empty) {
        names.pop();
    }
    while names.len() < count {
        names.push(names.len().to_string());
    }
    names.truncate(count);
    names
}

//  Tests
