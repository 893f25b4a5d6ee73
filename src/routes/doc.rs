use utoipa::{
    Modify, OpenApi,
    openapi::{
        self,
        OpenApi as OpenApiSpec,
        security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    },
};
use utoipa_scalar::{Scalar, Servable};

use crate::{
    dto::{
        auth::{LoginRequest, LoginResponse, RegisterRequest},
        cart::{AddToCartRequest, CartItemDto, CartList},
        orders::{
            AdminOrderList, AdminOrderSummary, CustomerInfo, OrderDetail, OrderLineDetail,
            OrderList, PlaceOrderRequest, UpdateOrderStatusRequest,
        },
        products::{CreateProductRequest, ProductDetail, ProductList},
    },
    models::{CartItem, Order, Product, ProductImage, User},
    response::{ApiResponse, Meta},
    routes::{admin, auth, cart, health, orders, params, products},
};

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health_check,
        auth::login,
        auth::register,
        cart::cart_list,
        cart::add_to_cart,
        cart::remove_from_cart,
        products::list_products,
        products::get_product,
        products::create_product,
        orders::list_orders,
        orders::place_order,
        admin::list_all_orders,
        admin::get_order_admin,
        admin::update_order_status,
    ),
    components(
        schemas(
            User,
            Product,
            ProductImage,
            CartItem,
            Order,
            CartList,
            CartItemDto,
            AddToCartRequest,
            ProductList,
            ProductDetail,
            CreateProductRequest,
            RegisterRequest,
            LoginRequest,
            LoginResponse,
            health::HealthData,
            OrderList,
            AdminOrderList,
            AdminOrderSummary,
            OrderDetail,
            OrderLineDetail,
            CustomerInfo,
            PlaceOrderRequest,
            UpdateOrderStatusRequest,
            params::Pagination,
            params::OrderListQuery,
            Meta,
            ApiResponse<Order>,
            ApiResponse<OrderList>,
            ApiResponse<AdminOrderList>,
            ApiResponse<OrderDetail>,
            ApiResponse<ProductDetail>,
            ApiResponse<ProductList>,
            ApiResponse<CartList>,
            ApiResponse<CartItem>,
            ApiResponse<User>,
            ApiResponse<LoginResponse>
        )
    ),
    security(
        ("bearer_auth" = [])
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Health check endpoint"),
        (name = "Products", description = "Product endpoints"),
        (name = "Cart", description = "Cart endpoints"),
        (name = "Orders", description = "Order endpoints"),
        (name = "Admin", description = "Admin endpoints"),
        (name = "Auth", description = "Authentication endpoints"),
    )
)]
pub struct ApiDoc;

pub fn scalar_docs() -> Scalar<OpenApiSpec> {
    Scalar::with_url("/docs", ApiDoc::openapi())
}
