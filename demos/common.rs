use arbitrary::Unstructured;
use rand::RngCore;
use spindle_cfg::{Bounded, Generator};

pub fn rand_u<'a>(buf: &'a mut [u8]) -> Unstructured<'a> {
    let mut rng = rand::rng();
    rng.fill_bytes(buf);
    Unstructured::new(buf)
}

/// Returns a string from fresh random bytes, retrying runs that nest deeper than `max_depth`.
pub fn draw(generator: &Generator, max_depth: usize) -> String {
    let mut buf = [0; 4096];
    loop {
        let mut src = Bounded::new(rand_u(&mut buf)).max_depth(max_depth);
        match generator.draw(&mut src) {
            Ok(s) => return s,
            Err(e) if e.abort().is_some() => continue,
            Err(e) => panic!("{}", e),
        }
    }
}

#[allow(dead_code)]
fn main() {}
