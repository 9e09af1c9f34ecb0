//! Complete round-trip example: CoNLL-U → annotation graph → CoNLL-U
//!
//! Run with: cargo run --example round_trip

use rebabel_conllu::{MemoryStore, Tier, UnitType, read_str, write_string};

fn main() {
    println!("=== rebabel-conllu: Round-Trip Example ===\n");

    let conllu_text = "# sent_id = example-001\n\
                       # text = I wanna run.\n\
                       1\tI\tI\tPRON\tPRP\tCase=Nom\t2\tnsubj\t2:nsubj\t_\n\
                       2-3\twanna\t_\t_\t_\t_\t_\t_\t_\t_\n\
                       2\twan\twant\tVERB\tVB\t_\t0\troot\t0:root\t_\n\
                       3\tna\tto\tPART\tTO\t_\t4\tmark\t4:mark\t_\n\
                       4\trun\trun\tVERB\tVB\t_\t2\txcomp\t2:xcomp\tSpaceAfter=No\n\
                       5\t.\t.\tPUNCT\t.\t_\t2\tpunct\t2:punct\t_\n\n";

    println!("Input CoNLL-U:");
    println!("{}", conllu_text);

    let mut store = MemoryStore::new();
    if let Err(e) = read_str(&mut store, conllu_text) {
        eprintln!("Decode error: {}", e);
        return;
    }

    for sentence in store.units_of_type(UnitType::Sentence) {
        println!("Sentence unit {}", sentence);
        for word in store.children(sentence, UnitType::Word) {
            let form = store
                .feature(word, Tier::UD, "form")
                .map(|v| v.to_string())
                .unwrap_or_default();
            let tokens = store.relations_from(word);
            println!("  word {} '{}' in tokens {:?}", word, form, tokens);
        }
        println!(
            "  {} enhanced dependencies",
            store.children(sentence, UnitType::Edep).len()
        );
    }

    println!("\nRe-encoded CoNLL-U:");
    match write_string(&store) {
        Ok(text) => print!("{}", text),
        Err(e) => eprintln!("Encode error: {}", e),
    }
}
