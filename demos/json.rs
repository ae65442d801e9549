mod common;
use spindle_cfg::{Generator, LarkGrammar, OneOf};

fn main() {
    let grammar: LarkGrammar = r#"
        ?value : object
               | array
               | string
               | SIGNED_NUMBER
               | "true" | "false" | "null"

        array  : "[" [value ("," value)*] "]"
        object : "{" [pair ("," pair)*] "}"
        pair   : string ":" value
        string : ESCAPED_STRING

        %import common.ESCAPED_STRING
        %import common.SIGNED_NUMBER
        %import common.WS
        %ignore WS
    "#
    .parse::<LarkGrammar>()
    .unwrap()
    .with_start(["value"]);

    let generator = Generator::new(&grammar).unwrap();
    println!("{}", generator);
    for depth in [4, 8, 16, 32] {
        println!("max depth {}: {}\n", depth, common::draw(&generator, depth));
    }

    // Readable keys and compact output: replace the string and whitespace terminals.
    let generator = Generator::builder()
        .start("object")
        .explicit(
            "ESCAPED_STRING",
            ["\"id\"", "\"name\"", "\"tags\""].into_iter().collect::<OneOf>(),
        )
        .explicit("WS", OneOf(vec![String::new()]))
        .build(&grammar)
        .unwrap();
    println!("{}", common::draw(&generator, 16));
}
