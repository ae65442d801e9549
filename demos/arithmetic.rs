mod common;
use common::rand_u;
use spindle_cfg::{Bounded, Generator, LarkGrammar, Recorder, Replay};

fn main() {
    let grammar: LarkGrammar = r#"
        ?start : sum
        ?sum   : product
               | sum_op
        sum_op : product ("+" | "-") sum
        ?product : atom
                 | atom ("*" | "/") product
        ?atom  : NUMBER
               | "-" atom
               | NAME "(" [sum ("," sum)*] ")"
               | "(" sum ")"

        NAME : /[a-z][a-z0-9]{0,4}/
        %import common.NUMBER
        %import common.WS_INLINE
        %ignore WS_INLINE
    "#
    .parse()
    .unwrap();

    let generator = Generator::new(&grammar).unwrap();
    for _ in 0..5 {
        println!("{}", common::draw(&generator, 12));
    }

    // Record the decisions of a run, then replay them to get the same expression back,
    // along with the scopes a shrinker would cut along.
    let mut buf = [0; 4096];
    let mut rec = Recorder::new(Bounded::new(rand_u(&mut buf)).max_depth(12));
    let Ok(expr) = generator.draw(&mut rec) else {
        println!("run aborted by the depth budget");
        return;
    };
    let replayed = generator
        .draw(&mut Replay::new(rec.choices().iter().copied()))
        .unwrap();
    assert_eq!(expr, replayed);

    let sum_label = generator.rule_label("sum_op");
    let sums = rec
        .spans()
        .iter()
        .filter(|s| Some(s.label) == sum_label)
        .count();
    println!(
        "{:?}: {} decisions, {} sum_op expansions",
        expr,
        rec.choices().len(),
        sums
    );
}
