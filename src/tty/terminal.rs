//! Terminal I/O layer: raw mode, Kitty Graphics Protocol, status bar.

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use crossterm::{
    ExecutableCommand, QueueableCommand, cursor,
    style::{self, Stylize},
    terminal,
};
use std::io::{self, Write, stdout};

use super::state::{Layout, Placement};

const CHUNK_SIZE: usize = 4096;

// ---------------------------------------------------------------------------
// RawGuard: Drop restores raw mode, the alternate screen and uploaded images
// ---------------------------------------------------------------------------

pub(super) struct RawGuard {
    cleaned: bool,
}

impl RawGuard {
    pub(super) fn enter() -> io::Result<Self> {
        terminal::enable_raw_mode()?;
        stdout().execute(terminal::EnterAlternateScreen)?;
        stdout().execute(cursor::Hide)?;
        Ok(Self { cleaned: false })
    }

    pub(super) fn cleanup(&mut self) {
        if self.cleaned {
            return;
        }
        self.cleaned = true;
        let _ = delete_all_images();
        let mut out = stdout();
        let _ = out.execute(cursor::Show);
        let _ = out.execute(terminal::LeaveAlternateScreen);
        let _ = terminal::disable_raw_mode();
    }
}

impl Drop for RawGuard {
    fn drop(&mut self) {
        self.cleanup();
    }
}

// ---------------------------------------------------------------------------
// Kitty protocol helpers
// ---------------------------------------------------------------------------

/// Upload PNG data in chunks (a=t: transmit only, no placement).
pub(super) fn send_image(png_data: &[u8], image_id: u32) -> io::Result<()> {
    // base64 output is ASCII, so every chunk boundary is a char boundary.
    let encoded = BASE64.encode(png_data);
    let chunks: Vec<&str> = encoded
        .as_bytes()
        .chunks(CHUNK_SIZE)
        .filter_map(|c| std::str::from_utf8(c).ok())
        .collect();

    let mut out = stdout();
    for (i, chunk) in chunks.iter().enumerate() {
        let m = if i + 1 == chunks.len() { 0 } else { 1 };
        if i == 0 {
            write!(
                out,
                "\x1b_Ga=t,f=100,i={image_id},t=d,q=2,m={m};{chunk}\x1b\\"
            )?;
        } else {
            write!(out, "\x1b_Gm={m},q=2;{chunk}\x1b\\")?;
        }
    }
    out.flush()
}

/// Kitty delete command. A lowercase target keeps the image data, an
/// uppercase one frees it.
fn delete_command(target: char, image_id: Option<u32>) -> String {
    match image_id {
        Some(id) => format!("\x1b_Ga=d,d={target},i={id},q=2\x1b\\"),
        None => format!("\x1b_Ga=d,d={target},q=2\x1b\\"),
    }
}

fn write_command(command: &str) -> io::Result<()> {
    let mut out = stdout();
    out.write_all(command.as_bytes())?;
    out.flush()
}

/// Delete an image's data and placements.
pub(super) fn delete_image(image_id: u32) -> io::Result<()> {
    write_command(&delete_command('I', Some(image_id)))
}

/// Remove an image's placements, keeping its data for re-placement.
pub(super) fn delete_placement(image_id: u32) -> io::Result<()> {
    write_command(&delete_command('i', Some(image_id)))
}

/// Delete every image and its data.
pub(super) fn delete_all_images() -> io::Result<()> {
    write_command(&delete_command('A', None))
}

/// Clear the text layer.
pub(super) fn clear_screen() -> io::Result<()> {
    let mut out = stdout();
    out.queue(terminal::Clear(terminal::ClearType::All))?;
    out.flush()
}

/// Place a cropped region of an uploaded image. `C=1` keeps the cursor
/// where it is.
pub(super) fn place_image(image_id: u32, p: &Placement) -> io::Result<()> {
    let mut out = stdout();
    out.queue(cursor::MoveTo(p.col, p.row))?;
    write!(
        out,
        "\x1b_Ga=p,i={image_id},x=0,y={},w={},h={},c={},r={},C=1,q=2\x1b\\",
        p.src_y, p.src_w, p.src_h, p.cols, p.rows
    )?;
    out.flush()
}

/// Draw `text` on the status row, padded to the full terminal width.
pub(super) fn draw_status_bar(layout: &Layout, text: &str) -> io::Result<()> {
    let mut out = stdout();
    out.queue(cursor::MoveTo(0, layout.status_row))?;
    let width = layout.image_cols as usize;
    let clipped: String = text.chars().take(width).collect();
    let padded = format!("{:<width$}", clipped, width = width);
    write!(out, "{}", padded.on_dark_grey().white())?;
    out.queue(style::ResetColor)?;
    out.flush()
}

pub(super) fn check_tty() -> anyhow::Result<()> {
    use std::io::IsTerminal;
    // Only stdout matters. crossterm's `use-dev-tty` reads keyboard from /dev/tty
    // (Unix) or Console API (Windows), so stdin being a pipe is always fine.
    if !io::stdout().is_terminal() {
        anyhow::bail!(
            "pageview requires an interactive terminal.\n\
             \n\
             Supported terminals: Kitty, Ghostty, WezTerm\n\
             To render a page to a file, use: pageview render <input.typ> -o page.png"
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delete_commands_select_target() {
        assert_eq!(delete_command('I', Some(101)), "\x1b_Ga=d,d=I,i=101,q=2\x1b\\");
        assert_eq!(delete_command('i', Some(7)), "\x1b_Ga=d,d=i,i=7,q=2\x1b\\");
        assert_eq!(delete_command('A', None), "\x1b_Ga=d,d=A,q=2\x1b\\");
    }
}
