pub mod fake_renderer;
