pub mod waveguide;
