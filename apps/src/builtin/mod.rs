pub mod bouncing_balls;
pub mod clock;
pub mod common;
pub mod rainbow_spiral;
pub mod solid_color;
pub mod system_load;

use ledmatrix::prelude::*;

/// Registers every built-in app, in the order they are listed.
pub fn register_all(registry: &AppRegistry) {
    registry.register(&clock::DESCRIPTOR, clock::init);
    registry.register(&solid_color::DESCRIPTOR, solid_color::init);
    registry.register(&rainbow_spiral::DESCRIPTOR, rainbow_spiral::init);
    registry.register(&bouncing_balls::DESCRIPTOR, bouncing_balls::init);
    registry.register(&system_load::DESCRIPTOR, system_load::init);
}
