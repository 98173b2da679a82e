//! motion-sonar library - background-subtraction motion sensing turned into
//! sample-accurate sonar sound

pub mod audio;
pub mod capture;
pub mod cli;
pub mod error;
pub mod motion;
pub mod params;
pub mod session;
pub mod sonification;
pub mod source;
