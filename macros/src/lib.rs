use proc_macro::TokenStream;
use quote::{format_ident, quote};
use syn::{parse_macro_input, parse_quote, Data, DeriveInput, Fields};

/// Implements `EntityDescriptor` for a struct whose fields are all components.
///
/// Every field becomes one component of the built entity; field types must be distinct.
#[proc_macro_derive(EntityDescriptor)]
pub fn derive_entity_descriptor_fn(input: TokenStream) -> TokenStream {
    let main_crate = quote!(::entity_db);

    let DeriveInput {
        ident,
        data,
        mut generics,
        ..
    } = parse_macro_input!(input as DeriveInput);

    let fields = match data {
        Data::Struct(data) => data.fields,
        _ => {
            return syn::Error::new(ident.span(), "EntityDescriptor can only be derived for structs")
                .to_compile_error()
                .into();
        }
    };

    let types: Vec<_> = fields.iter().map(|field| &field.ty).collect();

    // Generic structs need their parameters bounded so the generated pushes type-check.
    if !generics.params.is_empty() {
        let type_params: Vec<_> = generics.type_params().map(|p| p.ident.clone()).collect();
        let predicates = &mut generics.make_where_clause().predicates;
        for param in type_params {
            predicates.push(parse_quote!(#param: 'static));
        }
        for ty in &types {
            predicates.push(parse_quote!(#ty: #main_crate::Component));
        }
    }
    let (impl_generics, ty_generics, where_clause) = generics.split_for_impl();
    let bindings: Vec<_> = (0..fields.len()).map(|i| format_ident!("__c{}", i)).collect();

    let destructure: proc_macro2::TokenStream = match &fields {
        Fields::Named(named) => {
            let names = named.named.iter().map(|field| &field.ident);
            quote! { let #ident { #(#names: #bindings),* } = self; }
        }
        Fields::Unnamed(_) => quote! { let #ident ( #(#bindings),* ) = self; },
        Fields::Unit => quote! {},
    };

    quote! {
        impl #impl_generics #main_crate::EntityDescriptor for #ident #ty_generics #where_clause {
            #[allow(unused_variables)]
            fn component_ids(
                registry: &mut #main_crate::ComponentRegistry,
            ) -> #main_crate::private::ComponentIds {
                #main_crate::private::smallvec![#(registry.register::<#types>()),*]
            }

            #[allow(unused_variables)]
            fn write_row(self, row: &mut #main_crate::RowWriter<'_>) {
                #destructure
                #(row.push(#bindings);)*
            }
        }
    }
    .into()
}
