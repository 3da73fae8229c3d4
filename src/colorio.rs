// Copyright 2018 Peter Williams <peter@newton.cx>
// Licensed under the MIT License.

/*! Colorized CLI output.

Everything the user is meant to read goes through here; diagnostics go
through `tracing` instead.

*/

use failure::Error;
use std::fmt;
use std::io::Write;
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};


/// How to style some text to print.
///
/// Instead of using this type directly, use the `cprint!` family of macros.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Style {
    /// Good news, like a successful submission.
    Green,

    /// Labels and other text that should stand out.
    Highlight,

    /// Style some text in the standard plain way.
    Plain,

    /// Errors.
    Red,

    /// Things that didn't happen, like dry-run previews.
    Yellow,
}


/// Which stream to print to.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Stream {
    /// Print to standard error.
    Stderr,

    /// Print to standard output.
    Stdout,
}


macro_rules! cio_style {
    (green) => { $crate::colorio::Style::Green };
    (hl) => { $crate::colorio::Style::Highlight };
    (pl) => { $crate::colorio::Style::Plain };
    (red) => { $crate::colorio::Style::Red };
    (yellow) => { $crate::colorio::Style::Yellow };
}

macro_rules! cprint {
    ($cio:expr, $style:ident, $($fmt_args:expr),*) => {
        $cio.print_core($crate::colorio::Stream::Stdout, cio_style!($style), format_args!($($fmt_args),*))
    };
}

macro_rules! cprintln {
    ($cio:expr, $style:ident, $($fmt_args:expr),*) => {
        cprint!($cio, $style, $($fmt_args),*);
        cprint!($cio, pl, "\n");
    };
}

macro_rules! ecprint {
    ($cio:expr, $style:ident, $($fmt_args:expr),*) => {
        $cio.print_core($crate::colorio::Stream::Stderr, cio_style!($style), format_args!($($fmt_args),*))
    };
}

macro_rules! ecprintln {
    ($cio:expr, $style:ident, $($fmt_args:expr),*) => {
        ecprint!($cio, $style, $($fmt_args),*);
        ecprint!($cio, pl, "\n");
    };
}


/// State needed for our colorized I/O.
pub struct ColorIo {
    stdout: StandardStream,
    stderr: StandardStream,
    red: ColorSpec,
    green: ColorSpec,
    highlight: ColorSpec,
    yellow: ColorSpec,
}


impl ColorIo {
    pub fn new() -> Self {
        let stdout = StandardStream::stdout(ColorChoice::Auto);
        let stderr = StandardStream::stderr(ColorChoice::Auto);

        let mut green = ColorSpec::new();
        green.set_fg(Some(Color::Green)).set_bold(true);

        let mut highlight = ColorSpec::new();
        highlight.set_bold(true);

        let mut red = ColorSpec::new();
        red.set_fg(Some(Color::Red)).set_bold(true);

        let mut yellow = ColorSpec::new();
        yellow.set_fg(Some(Color::Yellow)).set_bold(true);

        ColorIo { stdout, stderr, green, highlight, red, yellow }
    }

    /// Print an error and the chain of things that caused it.
    pub fn print_error(&mut self, err: &Error) {
        let mut first = true;

        for cause in err.iter_chain() {
            if first {
                ecprint!(self, red, "error:");
                ecprintln!(self, pl, " {}", cause);
                first = false;
            } else {
                ecprint!(self, pl, "  ");
                ecprint!(self, red, "caused by:");
                ecprintln!(self, pl, " {}", cause);
            }
        }
    }

    /// Print a `label: value` line with an emphasized label.
    pub fn print_field<T: fmt::Display>(&mut self, label: &str, value: T) {
        cprint!(self, hl, "{:<9}:", label);
        cprintln!(self, pl, " {}", value);
    }

    /// Print formatted arguments to one of our streams.
    ///
    /// Use the `cprint!` macros instead of this function.
    #[inline(always)]
    pub fn print_core(&mut self, stream: Stream, style: Style, args: fmt::Arguments) {
        let spec = match style {
            Style::Green => Some(&self.green),
            Style::Highlight => Some(&self.highlight),
            Style::Plain => None,
            Style::Red => Some(&self.red),
            Style::Yellow => Some(&self.yellow),
        };

        let stream = match stream {
            Stream::Stderr => &mut self.stderr,
            Stream::Stdout => &mut self.stdout,
        };

        if let Some(spec) = spec {
            let _r = stream.set_color(spec);
        }

        let _r = write!(stream, "{}", args);

        if spec.is_some() {
            let _r = stream.reset();
        }
    }
}
