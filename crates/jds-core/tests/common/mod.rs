use jds_core::kinds::{CollectionOf, Double, Integer, Nested, NestedCollection, Text};
use jds_core::{EntityDecl, Field, MetadataRegistry};

pub const CONTACT: u64 = 100;
pub const PERSON: u64 = 101;
pub const ADDRESS: u64 = 102;

pub const DISPLAY_NAME: Field<Text> = Field::new(1, "display_name");
pub const AGE: Field<Integer> = Field::new(2, "age");
pub const HEIGHT: Field<Double> = Field::new(3, "height");
pub const NICKNAMES: Field<CollectionOf<Text>> = Field::new(4, "nicknames");
pub const HOME: Field<Nested> = Field::new(5, "home").with_target(ADDRESS);
pub const PAST_HOMES: Field<NestedCollection> = Field::new(6, "past_homes").with_target(ADDRESS);
pub const STREET: Field<Text> = Field::new(7, "street");

/// Contact <- Person, plus a standalone Address type
#[allow(dead_code)]
pub fn contact_registry() -> MetadataRegistry {
    let mut registry = MetadataRegistry::new();
    registry
        .register_type(EntityDecl::new(ADDRESS, "Address").field(&STREET))
        .unwrap();
    registry
        .register_type(
            EntityDecl::new(CONTACT, "Contact")
                .field(&DISPLAY_NAME)
                .field(&NICKNAMES),
        )
        .unwrap();
    registry
        .register_type(
            EntityDecl::new(PERSON, "Person")
                .parent(CONTACT)
                .field(&AGE)
                .field(&HEIGHT)
                .field(&HOME)
                .field(&PAST_HOMES),
        )
        .unwrap();
    registry
}
