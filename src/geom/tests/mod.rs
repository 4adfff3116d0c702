mod test_catmull_rom_basic;
mod test_curve_basic;
mod test_param_basic;
