//! Homography estimation: normalized DLT and robust fitting.

mod dlt;
mod ransac;

pub use ransac::{
    fit_homography_robust, FitFailure, HomographyFit, RobustFitConfig, RobustScoring, MIN_SAMPLE,
};

pub use dlt::estimate_homography_dlt;
