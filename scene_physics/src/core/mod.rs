//! Core engine types shared by the physics layer

pub mod entity;
