#[macro_use] extern crate quickcheck;

extern crate lwwset;
extern crate rand;
